use std::collections::HashMap;

use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, FromQueryResult, JoinType, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, RelationTrait, TransactionTrait,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit,
    dto::catalog::{
        BulkPriceUpdateRequest, BulkPriceUpdateResult, CategoryList, ProductDetail, ProductList,
        ProductOffer, ShopProductInfo, ShopProductInfoList,
    },
    entity::{
        categories::{Column as CategoryCol, Entity as Categories},
        product_infos::{self, Column as InfoCol, Entity as ProductInfos, Model as InfoModel},
        products::{self, Column as ProductCol, Entity as Products},
        shops::{Column as ShopCol, Entity as Shops},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Category, Product, ProductInfo, ProductParameter},
    response::{ApiResponse, Meta},
    routes::params::ProductQuery,
    state::AppState,
};

#[derive(Debug, FromQueryResult)]
struct ProductRow {
    id: Uuid,
    name: String,
    category_id: Uuid,
    category: String,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name,
            category_id: row.category_id,
            category: row.category,
        }
    }
}

#[derive(Debug, FromQueryResult)]
struct OfferRow {
    id: Uuid,
    product_id: Uuid,
    shop_id: Uuid,
    model: Option<String>,
    external_id: Option<i64>,
    quantity: i32,
    price: i64,
    price_rrc: i64,
    shop_name: String,
}

#[derive(Debug, sqlx::FromRow)]
struct ParameterRow {
    product_info_id: Uuid,
    name: String,
    value: String,
}

fn product_finder() -> sea_orm::Select<Products> {
    Products::find()
        .select_only()
        .column(ProductCol::Id)
        .column(ProductCol::Name)
        .column(ProductCol::CategoryId)
        .join(JoinType::InnerJoin, products::Relation::Categories.def())
        .column_as(CategoryCol::Name, "category")
}

pub async fn search_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();

    if let Some(search) = query.q.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(Expr::col((Products, ProductCol::Name)).ilike(pattern));
    }

    let finder = product_finder()
        .filter(condition)
        .order_by_asc(ProductCol::Name);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .into_model::<ProductRow>()
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Products",
        ProductList { items },
        Some(meta),
    ))
}

/// A product with the offers of shops currently accepting orders.
pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<ProductDetail>> {
    let product = product_finder()
        .filter(ProductCol::Id.eq(id))
        .into_model::<ProductRow>()
        .one(&state.orm)
        .await?;
    let product = match product {
        Some(p) => Product::from(p),
        None => return Err(AppError::NotFound),
    };

    let offers = ProductInfos::find()
        .join(JoinType::InnerJoin, product_infos::Relation::Shops.def())
        .column_as(ShopCol::Name, "shop_name")
        .filter(InfoCol::ProductId.eq(id))
        .filter(ShopCol::IsActive.eq(true))
        .order_by_asc(InfoCol::Price)
        .into_model::<OfferRow>()
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|row| ProductOffer {
            info: ProductInfo {
                id: row.id,
                product_id: row.product_id,
                shop_id: row.shop_id,
                model: row.model,
                external_id: row.external_id,
                quantity: row.quantity,
                price: row.price,
                price_rrc: row.price_rrc,
            },
            shop_name: row.shop_name,
        })
        .collect();

    Ok(ApiResponse::success(
        "Product",
        ProductDetail { product, offers },
        None,
    ))
}

pub async fn list_categories(state: &AppState) -> AppResult<ApiResponse<CategoryList>> {
    let items = Categories::find()
        .order_by_asc(CategoryCol::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|c| Category {
            id: c.id,
            name: c.name,
        })
        .collect();

    Ok(ApiResponse::success(
        "Categories",
        CategoryList { items },
        Some(Meta::empty()),
    ))
}

pub async fn list_shop_product_infos(
    state: &AppState,
    shop_id: Uuid,
) -> AppResult<ApiResponse<ShopProductInfoList>> {
    if Shops::find_by_id(shop_id).one(&state.orm).await?.is_none() {
        return Err(AppError::NotFound);
    }

    let infos = ProductInfos::find()
        .find_also_related(Products)
        .filter(InfoCol::ShopId.eq(shop_id))
        .order_by_asc(InfoCol::ExternalId)
        .all(&state.orm)
        .await?;

    let ids: Vec<Uuid> = infos.iter().map(|(info, _)| info.id).collect();
    let rows = sqlx::query_as::<_, ParameterRow>(
        r#"
        SELECT pp.product_info_id, p.name, pp.value
        FROM product_parameters pp
        JOIN parameters p ON p.id = pp.parameter_id
        WHERE pp.product_info_id = ANY($1)
        ORDER BY p.name
        "#,
    )
    .bind(&ids)
    .fetch_all(&state.pool)
    .await?;

    let mut parameters: HashMap<Uuid, Vec<ProductParameter>> = HashMap::new();
    for row in rows {
        parameters
            .entry(row.product_info_id)
            .or_default()
            .push(ProductParameter {
                name: row.name,
                value: row.value,
            });
    }

    let items = infos
        .into_iter()
        .map(|(info, product)| ShopProductInfo {
            product_name: product.map(|p| p.name).unwrap_or_default(),
            parameters: parameters.remove(&info.id).unwrap_or_default(),
            info: product_info_from_entity(info),
        })
        .collect();

    Ok(ApiResponse::success(
        "Shop products",
        ShopProductInfoList { items },
        Some(Meta::empty()),
    ))
}

/// Apply every entry in one transaction. Entries naming a product info that
/// belongs to another shop, or to nothing, are skipped and reported back.
pub async fn bulk_update_prices(
    state: &AppState,
    user: &AuthUser,
    shop_id: Uuid,
    payload: BulkPriceUpdateRequest,
) -> AppResult<ApiResponse<BulkPriceUpdateResult>> {
    payload.validate()?;

    let shop = Shops::find_by_id(shop_id).one(&state.orm).await?;
    let shop = match shop {
        Some(s) => s,
        None => return Err(AppError::NotFound),
    };
    if shop.user_id != user.user_id {
        return Err(AppError::Forbidden);
    }

    let mut updated = Vec::new();
    let mut skipped = Vec::new();
    let txn = state.orm.begin().await?;

    for entry in &payload.entries {
        let mut update = ProductInfos::update_many()
            .filter(InfoCol::Id.eq(entry.id))
            .filter(InfoCol::ShopId.eq(shop_id));
        if let Some(price) = entry.price {
            update = update.col_expr(InfoCol::Price, Expr::value(price));
        }
        if let Some(price_rrc) = entry.price_rrc {
            update = update.col_expr(InfoCol::PriceRrc, Expr::value(price_rrc));
        }
        if let Some(quantity) = entry.quantity {
            update = update.col_expr(InfoCol::Quantity, Expr::value(quantity));
        }

        if entry.price.is_none() && entry.price_rrc.is_none() && entry.quantity.is_none() {
            // nothing to set, but the id still has to belong to this shop
            let owned = ProductInfos::find()
                .filter(InfoCol::Id.eq(entry.id))
                .filter(InfoCol::ShopId.eq(shop_id))
                .count(&txn)
                .await?;
            if owned == 0 {
                skipped.push(entry.id);
            } else {
                updated.push(entry.id);
            }
            continue;
        }

        let result = update.exec(&txn).await?;
        if result.rows_affected == 0 {
            skipped.push(entry.id);
        } else {
            updated.push(entry.id);
        }
    }

    txn.commit().await?;

    if !skipped.is_empty() {
        tracing::warn!(%shop_id, skipped = skipped.len(), "price update skipped foreign entries");
    }

    audit::record(
        &state.pool,
        user.user_id,
        "price_update",
        "product_infos",
        serde_json::json!({
            "shop_id": shop_id,
            "updated": updated.len(),
            "skipped": skipped.len(),
        }),
    )
    .await;

    Ok(ApiResponse::success(
        "Prices updated",
        BulkPriceUpdateResult { updated, skipped },
        Some(Meta::empty()),
    ))
}

fn product_info_from_entity(model: InfoModel) -> ProductInfo {
    ProductInfo {
        id: model.id,
        product_id: model.product_id,
        shop_id: model.shop_id,
        model: model.model,
        external_id: model.external_id,
        quantity: model.quantity,
        price: model.price,
        price_rrc: model.price_rrc,
    }
}
