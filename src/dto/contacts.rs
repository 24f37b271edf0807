use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::Contact;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateContactRequest {
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(min = 1, max = 100))]
    pub street: String,
    #[validate(length(min = 1, max = 15))]
    pub house: String,
    #[validate(length(max = 15))]
    pub structure: Option<String>,
    #[validate(length(max = 15))]
    pub building: Option<String>,
    #[validate(length(max = 15))]
    pub apartment: Option<String>,
    #[validate(length(min = 5, max = 20))]
    pub phone: String,
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct ContactList {
    pub items: Vec<Contact>,
}
