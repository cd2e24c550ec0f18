// HTTP request handlers for the country endpoints

use actix_web::{web, HttpResponse};
use tracing::info;

use crate::api::errors::ApiError;
use crate::api::models::*;
use crate::model::{CountryFields, CountryFilter, FieldError, Page, PageRequest};
use crate::store::CountryStore;

type Store = web::Data<dyn CountryStore>;
type HandlerResult = Result<HttpResponse, ApiError>;

fn list_page(page: Page<crate::model::CountrySummary>) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::success(page.map(CountryListItem::from)))
}

/// Trims and upper-cases codes, then runs field validation.
fn checked_fields(mut fields: CountryFields) -> Result<CountryFields, ApiError> {
    fields.cca2 = fields.cca2.trim().to_ascii_uppercase();
    fields.cca3 = fields.cca3.trim().to_ascii_uppercase();
    let errors = fields.validate();
    if errors.is_empty() {
        Ok(fields)
    } else {
        Err(ApiError::Validation(errors))
    }
}

/// Health check endpoint
pub async fn health_check(store: Store) -> HttpResponse {
    let database = if store.ping().await {
        "connected"
    } else {
        "disconnected"
    };
    HttpResponse::Ok().json(ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        database: database.to_string(),
    }))
}

pub async fn list_countries(store: Store, query: web::Query<ListQuery>) -> HandlerResult {
    let query = query.into_inner();
    let filter = CountryFilter {
        region: query.region,
        language: query.language,
        exclude_id: None,
    };
    let page = store
        .list_countries(&filter, PageRequest::new(query.page, query.page_size))
        .await?;
    Ok(list_page(page))
}

pub async fn create_country(store: Store, body: web::Json<CountryFields>) -> HandlerResult {
    let fields = checked_fields(body.into_inner())?;
    let detail = store.create_country(&fields).await?;
    info!(id = detail.country.id, cca3 = %detail.country.fields.cca3, "country created");
    Ok(HttpResponse::Created().json(ApiResponse::success(CountryDetailView::from(detail))))
}

pub async fn get_country(store: Store, path: web::Path<i64>) -> HandlerResult {
    let detail = store.get_country(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(CountryDetailView::from(detail))))
}

pub async fn update_country(
    store: Store,
    path: web::Path<i64>,
    body: web::Json<CountryFields>,
) -> HandlerResult {
    let id = path.into_inner();
    let fields = checked_fields(body.into_inner())?;
    // cca3 is the import key and never changes once assigned
    let current = store.get_country(id).await?;
    if current.country.fields.cca3 != fields.cca3 {
        return Err(ApiError::Validation(vec![FieldError::new(
            "cca3",
            "is immutable",
        )]));
    }
    let detail = store.update_country(id, &fields).await?;
    info!(id, "country updated");
    Ok(HttpResponse::Ok().json(ApiResponse::success(CountryDetailView::from(detail))))
}

pub async fn delete_country(store: Store, path: web::Path<i64>) -> HandlerResult {
    let id = path.into_inner();
    store.delete_country(id).await?;
    info!(id, "country deleted");
    Ok(HttpResponse::NoContent().finish())
}

pub async fn get_country_by_code(store: Store, path: web::Path<String>) -> HandlerResult {
    let code = path.into_inner().trim().to_ascii_uppercase();
    let detail = store.get_country_by_cca3(&code).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(CountryDetailView::from(detail))))
}

/// Other countries sharing the region of country `id`.
pub async fn same_region(
    store: Store,
    path: web::Path<i64>,
    query: web::Query<PageQuery>,
) -> HandlerResult {
    let id = path.into_inner();
    let detail = store.get_country(id).await?;
    let request = query.request();
    let Some(region) = detail.country.fields.region else {
        return Ok(list_page(Page {
            count: 0,
            page: request.page,
            page_size: request.page_size,
            results: Vec::new(),
        }));
    };
    let filter = CountryFilter {
        region: Some(region),
        language: None,
        exclude_id: Some(id),
    };
    Ok(list_page(store.list_countries(&filter, request).await?))
}

pub async fn border_neighbours(store: Store, path: web::Path<i64>) -> HandlerResult {
    let id = path.into_inner();
    // 404 for an unknown id rather than an empty list
    store.get_country(id).await?;
    let neighbours = store.border_neighbours(id).await?;
    let codes: Vec<serde_json::Value> = neighbours
        .into_iter()
        .map(|c| {
            serde_json::json!({
                "id": c.id,
                "cca3": c.fields.cca3,
                "name": c.fields.common_name,
            })
        })
        .collect();
    Ok(HttpResponse::Ok().json(ApiResponse::success(codes)))
}

pub async fn by_region(
    store: Store,
    path: web::Path<String>,
    query: web::Query<PageQuery>,
) -> HandlerResult {
    let filter = CountryFilter {
        region: Some(path.into_inner()),
        ..CountryFilter::default()
    };
    Ok(list_page(store.list_countries(&filter, query.request()).await?))
}

pub async fn by_language(
    store: Store,
    path: web::Path<String>,
    query: web::Query<PageQuery>,
) -> HandlerResult {
    let filter = CountryFilter {
        language: Some(path.into_inner()),
        ..CountryFilter::default()
    };
    Ok(list_page(store.list_countries(&filter, query.request()).await?))
}

pub async fn search(store: Store, query: web::Query<SearchQuery>) -> HandlerResult {
    let query = query.into_inner();
    let term = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::BadRequest("query parameter q is required".into()))?;
    let page = store
        .search_countries(term, PageRequest::new(query.page, query.page_size))
        .await?;
    Ok(list_page(page))
}
