//! Product management route handlers.

use askama::Template;
use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use tracing::instrument;

use star_admin_core::{Product, ProductId};

use crate::error::AppError;
use crate::services::products::{MSG_PRODUCT_ADDED, MSG_PRODUCT_DELETED, MSG_PRODUCT_UPDATED};
use crate::services::{ImageUpload, ProductForm, ProductService, format_timestamp};
use crate::state::AppState;

use super::{Alerts, redirect_with, render, render_with_status};

/// Upper bound on a product form upload.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Build the products router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(index).post(create))
        .route("/products/{id}", post(update))
        .route("/products/{id}/edit", get(edit))
        .route("/products/{id}/delete", post(delete))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

/// Product row for templates.
#[derive(Debug, Clone)]
pub struct ProductView {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: String,
    pub image_url: Option<String>,
    pub created_at: String,
}

impl From<&Product> for ProductView {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.get(),
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price().display(),
            image_url: product.image_url.clone(),
            created_at: format_timestamp(product.created_at),
        }
    }
}

/// The product being edited.
#[derive(Debug, Clone)]
pub struct EditingView {
    pub id: i64,
    pub image_url: Option<String>,
}

/// Products page template.
#[derive(Template)]
#[template(path = "products/index.html")]
pub struct ProductsPageTemplate {
    pub current_path: String,
    pub notice: Option<String>,
    pub error: Option<String>,
    pub products: Vec<ProductView>,
    pub form: ProductForm,
    pub editing: Option<EditingView>,
}

impl ProductsPageTemplate {
    fn new(alerts: Alerts) -> Self {
        Self {
            current_path: "/products".to_string(),
            notice: alerts.notice,
            error: alerts.error,
            products: Vec::new(),
            form: ProductForm::default(),
            editing: None,
        }
    }
}

/// Load the list into `page`, recording a failure as the page error.
async fn fill_products(service: &ProductService<'_>, page: &mut ProductsPageTemplate) -> Vec<Product> {
    match service.list().await {
        Ok(products) => {
            page.products = products.iter().map(ProductView::from).collect();
            products
        }
        Err(e) => {
            tracing::error!("Failed to fetch products: {e}");
            page.error = Some(e.to_string());
            Vec::new()
        }
    }
}

/// Products page handler.
///
/// GET /products
#[instrument(skip(state))]
async fn index(State(state): State<AppState>, Query(alerts): Query<Alerts>) -> Response {
    let service = ProductService::new(state.data());
    let mut page = ProductsPageTemplate::new(alerts);
    fill_products(&service, &mut page).await;
    render(&page).into_response()
}

/// Products page with the edit form prefilled.
///
/// GET /products/{id}/edit
#[instrument(skip(state))]
async fn edit(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(alerts): Query<Alerts>,
) -> Response {
    let id = ProductId::new(id);
    let service = ProductService::new(state.data());
    let mut page = ProductsPageTemplate::new(alerts);
    let products = fill_products(&service, &mut page).await;

    if page.error.is_none() {
        let Some(product) = products.iter().find(|p| p.id == id) else {
            return redirect_with("/products", "error", &format!("Product {id} not found."))
                .into_response();
        };
        page.form = ProductForm::from_product(product);
        page.editing = Some(EditingView {
            id: id.get(),
            image_url: product.image_url.clone(),
        });
    }

    render(&page).into_response()
}

/// Parsed multipart product submission.
struct Submission {
    form: ProductForm,
    image: Option<ImageUpload>,
}

async fn read_submission(mut multipart: Multipart) -> Result<Submission, AppError> {
    let mut form = ProductForm::default();
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == "image" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let content_type = field.content_type().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;

            // Browsers send an empty part when no file was chosen.
            if !file_name.is_empty() && !bytes.is_empty() {
                image = Some(ImageUpload {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        match name.as_str() {
            "name" => form.name = value,
            "description" => form.description = value,
            "price" => form.price = value,
            _ => {}
        }
    }

    Ok(Submission { form, image })
}

/// Re-render the page with the submitted values and the error inline.
async fn rerender_with_error(
    service: &ProductService<'_>,
    submission: Submission,
    editing: Option<EditingView>,
    err: AppError,
) -> Response {
    let status = err.status();
    let mut page = ProductsPageTemplate::new(Alerts::default());
    fill_products(service, &mut page).await;
    page.error = Some(err.to_string());
    page.form = submission.form;
    page.editing = editing;
    render_with_status(status, &page).into_response()
}

/// Create a product.
///
/// POST /products
#[instrument(skip(state, multipart))]
async fn create(State(state): State<AppState>, multipart: Multipart) -> Response {
    let submission = match read_submission(multipart).await {
        Ok(submission) => submission,
        Err(e) => return e.into_response(),
    };
    let service = ProductService::new(state.data());

    match service
        .create(&submission.form, submission.image.clone())
        .await
    {
        Ok(()) => redirect_with("/products", "notice", MSG_PRODUCT_ADDED).into_response(),
        Err(e) => rerender_with_error(&service, submission, None, e.into()).await,
    }
}

/// Update a product.
///
/// POST /products/{id}
#[instrument(skip(state, multipart))]
async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Response {
    let submission = match read_submission(multipart).await {
        Ok(submission) => submission,
        Err(e) => return e.into_response(),
    };
    let service = ProductService::new(state.data());
    let product_id = ProductId::new(id);

    match service
        .update(product_id, &submission.form, submission.image.clone())
        .await
    {
        Ok(()) => redirect_with("/products", "notice", MSG_PRODUCT_UPDATED).into_response(),
        Err(e) => {
            let image_url = service
                .find(product_id)
                .await
                .ok()
                .flatten()
                .and_then(|p| p.image_url);
            let editing = EditingView { id, image_url };
            rerender_with_error(&service, submission, Some(editing), e.into()).await
        }
    }
}

/// Delete a product. The browser confirms before submitting.
///
/// POST /products/{id}/delete
#[instrument(skip(state))]
async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> Redirect {
    let service = ProductService::new(state.data());
    match service.delete(ProductId::new(id)).await {
        Ok(()) => redirect_with("/products", "notice", MSG_PRODUCT_DELETED),
        Err(e) => redirect_with("/products", "error", &e.to_string()),
    }
}
