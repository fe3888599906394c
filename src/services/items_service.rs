use std::collections::HashMap;

use axum::extract::{FromRequest, Multipart, Path, Query, Request, State};
use axum::http::{header, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::listing::{ListingPage, ListingParams};
use crate::middleware::AuthenticatedUser;
use crate::models::{Item, ItemDetail, ItemDraft, ItemPatch, ItemSummary, Role};
use crate::storage::UploadedFile;

use super::AppState;

#[derive(Debug, Serialize)]
pub struct ItemMessage {
    pub message: &'static str,
    pub item: ItemSummary,
}

#[derive(Debug, Serialize)]
pub struct Message {
    pub message: &'static str,
}

/// JSON partial update. Price accepts a number or a numeric string.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemBody {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<Value>,
    pub category: Option<String>,
    pub condition: Option<String>,
    pub is_available: Option<bool>,
    pub is_sold: Option<bool>,
}

impl From<UpdateItemBody> for ItemPatch {
    fn from(body: UpdateItemBody) -> Self {
        let price = body.price.and_then(|v| match v {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        });
        ItemPatch {
            title: body.title,
            description: body.description,
            price,
            category: body.category,
            condition: body.condition,
            is_available: body.is_available,
            is_sold: body.is_sold,
        }
    }
}

/// Text fields and `images` file parts of a multipart item form.
#[derive(Debug, Default)]
struct ItemForm {
    fields: HashMap<String, String>,
    files: Vec<UploadedFile>,
}

impl ItemForm {
    async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = ItemForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::Input(e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == "images" {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Input(e.body_text()))?;
                // An untouched file input still sends an empty, unnamed part
                if filename.is_empty() && data.is_empty() {
                    continue;
                }
                form.files.push(UploadedFile {
                    filename,
                    content_type,
                    data,
                });
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::Input(e.body_text()))?;
                form.fields.insert(name, value);
            }
        }
        Ok(form)
    }

    fn take(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name)
    }

    fn draft(&mut self) -> ItemDraft {
        ItemDraft {
            title: self.take("title").unwrap_or_default(),
            description: self.take("description").unwrap_or_default(),
            price: self.take("price").unwrap_or_default(),
            category: self.take("category").unwrap_or_default(),
            condition: self.take("condition").unwrap_or_default(),
        }
    }

    fn patch(&mut self) -> AppResult<ItemPatch> {
        Ok(ItemPatch {
            title: self.take("title"),
            description: self.take("description"),
            price: self.take("price"),
            category: self.take("category"),
            condition: self.take("condition"),
            is_available: self
                .take("isAvailable")
                .map(|v| parse_flag("isAvailable", &v))
                .transpose()?,
            is_sold: self
                .take("isSold")
                .map(|v| parse_flag("isSold", &v))
                .transpose()?,
        })
    }
}

fn parse_flag(field: &str, value: &str) -> AppResult<bool> {
    match value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(AppError::validation(field, "Must be true or false")),
    }
}

/// Ids that are not UUIDs cannot resolve to an item.
fn parse_item_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound("Item not found".to_string()))
}

/// Token claims can outlive a role or university change in the directory.
fn note_stale_claims(user: &AuthenticatedUser, err: &AppError) {
    if matches!(err, AppError::Authorization(_)) && user.role == Role::Seller {
        tracing::warn!(
            "Token for user={} claims role seller but the directory disagrees",
            user.user_id
        );
    }
}

fn is_multipart(req: &Request) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"))
}

pub async fn list_items(
    State(state): State<AppState>,
    Query(params): Query<ListingParams>,
) -> AppResult<Json<ListingPage>> {
    let request = params.parse(state.page_limits)?;
    Ok(Json(state.listing.list(&request).await?))
}

pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ItemDetail>> {
    let id = parse_item_id(&id)?;
    Ok(Json(state.lifecycle.get_item(id).await?))
}

pub async fn create_item(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<ItemMessage>)> {
    let mut form = ItemForm::read(multipart).await?;
    let draft = form.draft();
    // Field errors are reported before anything is uploaded
    draft.validate()?;

    let references = state.blobs.resolve_all(&form.files).await?;
    let item = match state
        .lifecycle
        .create_item(user.user_id, &draft, references.clone())
        .await
    {
        Ok(item) => item,
        Err(e) => {
            note_stale_claims(&user, &e);
            state.blobs.discard(&references).await;
            return Err(e);
        }
    };
    if item.university != user.university {
        tracing::info!(
            "Item {} takes university '{}' from the profile, token says '{}'",
            item.id,
            item.university,
            user.university
        );
    }

    let item = state.lifecycle.with_seller(item).await?;
    Ok((
        StatusCode::CREATED,
        Json(ItemMessage {
            message: "Item created successfully",
            item,
        }),
    ))
}

pub async fn update_item(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    req: Request,
) -> AppResult<Json<ItemMessage>> {
    let id = parse_item_id(&id)?;

    let (patch, files) = if is_multipart(&req) {
        let multipart = Multipart::from_request(req, &state)
            .await
            .map_err(|e| AppError::Input(e.body_text()))?;
        let mut form = ItemForm::read(multipart).await?;
        (form.patch()?, std::mem::take(&mut form.files))
    } else {
        let Json(body) = Json::<UpdateItemBody>::from_request(req, &state)
            .await
            .map_err(|e| AppError::Input(e.body_text()))?;
        (ItemPatch::from(body), Vec::new())
    };

    let references = state.blobs.resolve_all(&files).await?;
    let item = match state
        .lifecycle
        .update_item(user.user_id, id, &patch, references.clone())
        .await
    {
        Ok(item) => item,
        Err(e) => {
            state.blobs.discard(&references).await;
            return Err(e);
        }
    };

    let item = state.lifecycle.with_seller(item).await?;
    Ok(Json(ItemMessage {
        message: "Item updated successfully",
        item,
    }))
}

pub async fn delete_item(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> AppResult<Json<Message>> {
    let id = parse_item_id(&id)?;
    let removed = state.lifecycle.delete_item(user.user_id, id).await?;
    state.blobs.discard(&removed.images).await;

    Ok(Json(Message {
        message: "Item deleted successfully",
    }))
}

pub async fn my_items(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<Item>>> {
    let items = state
        .lifecycle
        .list_owned_items(user.user_id)
        .await
        .inspect_err(|e| note_stale_claims(&user, e))?;
    Ok(Json(items))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use http::Request;
    use serde_json::json;

    use super::*;
    use crate::models::Role;
    use crate::services::test_support::{multipart_body, multipart_request, TestApp, BOUNDARY};

    fn iphone_fields() -> Vec<(&'static str, &'static str)> {
        vec![
            ("title", "iPhone 12"),
            ("description", "128GB, unlocked, minor scratches"),
            ("price", "1500"),
            ("category", "electronics"),
            ("condition", "good"),
        ]
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn json_request(method: &str, uri: &str, token: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {}", token))
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn create(app: &TestApp, token: &str) -> Value {
        let (status, body) = app
            .send(multipart_request(
                "POST",
                "/api/items",
                token,
                multipart_body(&iphone_fields(), 2),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body
    }

    #[test]
    fn test_update_body_price_number_or_string() {
        let body: UpdateItemBody = serde_json::from_value(json!({ "price": 12.5 })).unwrap();
        assert_eq!(ItemPatch::from(body).price.as_deref(), Some("12.5"));
        let body: UpdateItemBody =
            serde_json::from_value(json!({ "price": "99", "isAvailable": false })).unwrap();
        let patch = ItemPatch::from(body);
        assert_eq!(patch.price.as_deref(), Some("99"));
        assert_eq!(patch.is_available, Some(false));
        assert_eq!(patch.title, None);
    }

    #[test]
    fn test_parse_flag_and_item_id() {
        assert!(parse_flag("isSold", "true").unwrap());
        assert!(!parse_flag("isSold", "false").unwrap());
        assert!(matches!(
            parse_flag("isSold", "yes"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(parse_item_id("abc"), Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_create_and_fetch_item() {
        let app = TestApp::new(false).await;
        let (seller, token) = app.user("Kofi", Role::Seller).await;

        let body = create(&app, &token).await;
        assert_eq!(body["message"], "Item created successfully");
        let item = &body["item"];
        assert_eq!(item["title"], "iPhone 12");
        assert_eq!(item["price"], 1500.0);
        assert_eq!(item["views"], 0);
        assert_eq!(item["sellerId"], seller.id.to_string());
        assert_eq!(item["seller"]["name"], "Kofi");
        assert_eq!(item["images"].as_array().unwrap().len(), 2);
        assert_eq!(std::fs::read_dir(app.upload_dir.path()).unwrap().count(), 2);

        let id = item["id"].as_str().unwrap();
        let (status, detail) = app.send(get(&format!("/api/items/{}", id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["views"], 1);
        assert_eq!(detail["seller"]["phone"], "+233240000000");
        assert!(detail["seller"].get("email").is_none());
    }

    #[tokio::test]
    async fn test_create_requires_authentication() {
        let app = TestApp::new(false).await;
        let req = Request::builder()
            .method("POST")
            .uri("/api/items")
            .header(
                "content-type",
                format!(
                    "multipart/form-data; boundary={}",
                    crate::services::test_support::BOUNDARY
                ),
            )
            .body(multipart_body(&iphone_fields(), 1))
            .unwrap();
        let (status, body) = app.send(req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["category"], "unauthenticated");
    }

    #[tokio::test]
    async fn test_create_rejections() {
        let app = TestApp::new(false).await;
        let (_, buyer) = app.user("Ama", Role::Buyer).await;
        let (_, seller) = app.user("Kojo", Role::Seller).await;

        let (status, body) = app
            .send(multipart_request(
                "POST",
                "/api/items",
                &buyer,
                multipart_body(&iphone_fields(), 1),
            ))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["category"], "authorization");
        // rejected create leaves no stored blobs behind
        assert_eq!(std::fs::read_dir(app.upload_dir.path()).unwrap().count(), 0);

        let (status, body) = app
            .send(multipart_request(
                "POST",
                "/api/items",
                &seller,
                multipart_body(&iphone_fields(), 0),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["category"], "input");

        let mut fields = iphone_fields();
        fields[0] = ("title", "TV");
        fields[2] = ("price", "-3");
        let (status, body) = app
            .send(multipart_request(
                "POST",
                "/api/items",
                &seller,
                multipart_body(&fields, 1),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["category"], "validation");
        assert_eq!(body["errors"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_file_input_is_skipped() {
        let app = TestApp::new(false).await;
        let (_, token) = app.user("Nana", Role::Seller).await;

        let mut body = String::new();
        for (name, value) in iphone_fields() {
            body.push_str(&format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                name,
                value,
                b = BOUNDARY
            ));
        }
        body.push_str(&format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"images\"; filename=\"front.png\"\r\nContent-Type: image/png\r\n\r\nPNGDATA\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"images\"; filename=\"\"\r\nContent-Type: application/octet-stream\r\n\r\n\r\n\
             --{b}--\r\n",
            b = BOUNDARY
        ));

        let (status, body) = app
            .send(multipart_request("POST", "/api/items", &token, Body::from(body)))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        assert_eq!(body["item"]["images"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_seller_token_is_forbidden() {
        let app = TestApp::new(false).await;
        let (mut profile, token) = app.user("Adjoa", Role::Seller).await;
        profile.role = Role::Buyer;
        app.users.upsert(profile).await;

        let (status, body) = app
            .send(multipart_request(
                "POST",
                "/api/items",
                &token,
                multipart_body(&iphone_fields(), 1),
            ))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["category"], "authorization");

        let req = Request::builder()
            .uri("/api/items/seller/my-items")
            .header("authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        let (status, _) = app.send(req).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_update_json_and_multipart() {
        let app = TestApp::new(false).await;
        let (_, token) = app.user("Efua", Role::Seller).await;
        let created = create(&app, &token).await;
        let uri = format!("/api/items/{}", created["item"]["id"].as_str().unwrap());

        let (status, body) = app
            .send(json_request(
                "PUT",
                &uri,
                &token,
                json!({ "price": 1200, "isAvailable": false }),
            ))
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["message"], "Item updated successfully");
        assert_eq!(body["item"]["price"], 1200.0);
        assert_eq!(body["item"]["isAvailable"], false);

        let (status, body) = app
            .send(multipart_request(
                "PUT",
                &uri,
                &token,
                multipart_body(&[("isSold", "true")], 1),
            ))
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["item"]["isSold"], true);
        assert_eq!(body["item"]["images"].as_array().unwrap().len(), 3);

        let (status, body) = app
            .send(multipart_request(
                "PUT",
                &uri,
                &token,
                multipart_body(&[], 3),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["category"], "validation");
        assert_eq!(std::fs::read_dir(app.upload_dir.path()).unwrap().count(), 3);
    }

    #[tokio::test]
    async fn test_other_seller_cannot_delete() {
        let app = TestApp::new(false).await;
        let (_, owner) = app.user("Akosua", Role::Seller).await;
        let (_, other) = app.user("Kwame", Role::Seller).await;
        let created = create(&app, &owner).await;
        let uri = format!("/api/items/{}", created["item"]["id"].as_str().unwrap());

        let req = Request::builder()
            .method("DELETE")
            .uri(&uri)
            .header("authorization", format!("Bearer {}", other))
            .body(Body::empty())
            .unwrap();
        let (status, _) = app.send(req).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let req = Request::builder()
            .method("DELETE")
            .uri(&uri)
            .header("authorization", format!("Bearer {}", owner))
            .body(Body::empty())
            .unwrap();
        let (status, body) = app.send(req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Item deleted successfully");
        assert_eq!(std::fs::read_dir(app.upload_dir.path()).unwrap().count(), 0);

        let (status, body) = app.send(get(&uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Item not found");
    }

    #[tokio::test]
    async fn test_list_and_my_items() {
        let app = TestApp::new(false).await;
        let (_, token) = app.user("Yaa", Role::Seller).await;
        create(&app, &token).await;
        create(&app, &token).await;

        let (status, body) = app
            .send(get("/api/items?category=electronics&minPrice=1000&pageSize=1"))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 2);
        assert_eq!(body["totalPages"], 2);
        assert_eq!(body["currentPage"], 1);
        assert_eq!(body["items"].as_array().unwrap().len(), 1);

        let (status, body) = app.send(get("/api/items?category=vehicles")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["category"], "validation");

        let req = Request::builder()
            .uri("/api/items/seller/my-items")
            .header("authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        let (status, body) = app.send(req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);

        let (status, _) = app.send(get("/api/items/seller/my-items")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = app.send(get("/api/items/not-a-uuid")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
