//! One method per backend operation.
//!
//! Each method is a fixed mapping to an endpoint, method and body shape and
//! returns the backend payload untouched. Normalizing it is left to
//! [`crate::model`], so callers decide which envelope they expect.

use crate::chat::{ChatPrompt, ChatSuggestionParser, DelimitedTextParser, Suggestion};
use crate::error::ApiResult;
use crate::http::{Attachment, HttpClient, MultipartForm, RequestOptions};
use crate::model::{Book, Creator, CurrentUser, Library};
use crate::ownership::{self, Owner};
use crate::session::Session;
use reqwest::Method;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    #[serde(rename = "Username")]
    pub username: String,
    pub password: String,
}

/// Signup is sent as multipart: the backend only reads form fields from
/// multipart requests on this route.
#[derive(Debug, Clone)]
pub struct Signup {
    pub username: String,
    pub password: String,
    pub avatar: Option<Attachment>,
}

#[derive(Debug, Clone, Default)]
pub struct BookFilters {
    pub name: Option<String>,
    pub category: Option<String>,
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LibraryFilters {
    pub name: Option<String>,
    pub address: Option<String>,
}

fn to_params(pairs: &[(&str, &Option<String>)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .filter_map(|(k, v)| match v {
            Some(v) if !v.is_empty() => Some((k.to_string(), v.to_string())),
            _ => None,
        })
        .collect()
}

impl BookFilters {
    pub fn params(&self) -> BTreeMap<String, String> {
        to_params(&[
            ("name", &self.name),
            ("category", &self.category),
            ("created_by", &self.created_by),
        ])
    }
}

impl LibraryFilters {
    pub fn params(&self) -> BTreeMap<String, String> {
        to_params(&[("name", &self.name), ("address", &self.address)])
    }
}

/// Fields for creating or patching a book. A cover switches the body to multipart.
#[derive(Debug, Clone, Default)]
pub struct BookInput {
    pub name: Option<String>,
    pub category: Option<String>,
    pub library: Option<String>,
    pub author: Option<String>,
    pub cover: Option<Attachment>,
}

impl BookInput {
    fn fields(&self) -> [(&'static str, Option<&str>); 4] {
        [
            ("name", self.name.as_deref()),
            ("category", self.category.as_deref()),
            ("library", self.library.as_deref()),
            ("author", self.author.as_deref()),
        ]
    }

    fn into_options(self, method: Method) -> RequestOptions {
        let options = RequestOptions::new(method);
        match &self.cover {
            Some(cover) => {
                let form = self
                    .fields()
                    .into_iter()
                    .fold(MultipartForm::new(), |form, (k, v)| form.text_opt(k, v));
                options.multipart(form.file("image", cover.clone()))
            }
            None => {
                let body: Map<String, Value> = self
                    .fields()
                    .into_iter()
                    .filter_map(|(k, v)| Some((k.to_string(), Value::from(v?))))
                    .collect();
                options.json(Value::Object(body))
            }
        }
    }
}

impl From<&Suggestion> for BookInput {
    fn from(s: &Suggestion) -> Self {
        Self {
            name: s.name.clone(),
            category: s.category.clone(),
            library: s.library.clone(),
            author: s.author.clone(),
            cover: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LibraryInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(rename = "Created_By", skip_serializing_if = "Option::is_none")]
    pub created_by: Option<Creator>,
}

/// Profile changes. Always multipart because of the optional avatar.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub new_username: Option<String>,
    pub new_password: Option<String>,
    pub avatar: Option<Attachment>,
}

impl UserUpdate {
    /// True when there is nothing to send.
    pub fn is_empty(&self) -> bool {
        self.form().is_empty()
    }

    fn form(&self) -> MultipartForm {
        let form = MultipartForm::new()
            .text_opt("newUsername", self.new_username.as_deref())
            .text_opt("newPassword", self.new_password.as_deref());
        match &self.avatar {
            Some(a) => form.file("image", a.clone()),
            None => form,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SummaryRequest {
    pub name: String,
    pub category: String,
    pub author: String,
}

/// Everything the dashboard shows, fetched in one go.
#[derive(Debug, Clone)]
pub struct Dashboard {
    pub books: Vec<Book>,
    pub libraries: Vec<Library>,
    pub owned_libraries: Vec<Library>,
}

#[derive(Clone)]
pub struct LibrisApi {
    http: HttpClient,
    parser: Arc<dyn ChatSuggestionParser>,
    cancel: Option<CancellationToken>,
}

impl LibrisApi {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            parser: Arc::new(DelimitedTextParser),
            cancel: None,
        }
    }

    pub fn with_parser(mut self, parser: Arc<dyn ChatSuggestionParser>) -> Self {
        self.parser = parser;
        self
    }

    /// A handle whose requests all abort once `token` is cancelled.
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            cancel: Some(token),
            ..self.clone()
        }
    }

    pub fn session(&self) -> &Session {
        self.http.session()
    }

    pub fn current_user(&self) -> Option<CurrentUser> {
        self.session().current_user()
    }

    async fn call(&self, endpoint: &str, options: RequestOptions) -> ApiResult<Value> {
        self.http
            .request(endpoint, options.cancel(self.cancel.clone()))
            .await
    }

    async fn delete(&self, endpoint: &str) -> ApiResult<Value> {
        self.call(endpoint, RequestOptions::new(Method::DELETE)).await
    }

    // --- Auth ---

    /// Logs in and stores the returned token (and user, when the backend sends one).
    pub async fn login(&self, credentials: &Credentials) -> ApiResult<Value> {
        let body = serde_json::to_value(credentials)?;
        let data = self
            .call("/auth/login", RequestOptions::new(Method::POST).json(body))
            .await?;
        self.remember(&data)?;
        Ok(data)
    }

    /// Creates an account. Some backends log the new user straight in; if a
    /// token comes back it is stored.
    pub async fn signup(&self, signup: Signup) -> ApiResult<Value> {
        let mut form = MultipartForm::new()
            .text("Username", signup.username)
            .text("password", signup.password);
        if let Some(avatar) = signup.avatar {
            form = form.file("image", avatar);
        }
        let data = self
            .call("/auth/signup", RequestOptions::new(Method::POST).multipart(form))
            .await?;
        self.remember(&data)?;
        Ok(data)
    }

    fn remember(&self, data: &Value) -> ApiResult<()> {
        let Some(token) = data.get("token").and_then(Value::as_str) else {
            return Ok(());
        };
        // A new token replaces the whole identity, cached user included.
        self.session().clear()?;
        self.session().set_token(token)?;
        if let Some(user) = data.get("user").filter(|u| u.is_object()) {
            self.session().cache_user(user)?;
        }
        Ok(())
    }

    /// Forgets the session. Nothing is sent to the backend.
    pub fn logout(&self) -> ApiResult<()> {
        self.session().clear()?;
        Ok(())
    }

    pub async fn get_profile(&self, id: &str) -> ApiResult<Value> {
        self.call(&format!("/auth/profile/{}", id), RequestOptions::get())
            .await
    }

    pub async fn update_user(&self, id: &str, update: &UserUpdate) -> ApiResult<Value> {
        self.call(
            &format!("/auth/update/{}", id),
            RequestOptions::new(Method::PATCH).multipart(update.form()),
        )
        .await
    }

    pub async fn delete_user(&self, id: &str) -> ApiResult<Value> {
        self.delete(&format!("/auth/delete/{}", id)).await
    }

    // --- Books ---

    pub async fn get_books(&self, filters: &BookFilters) -> ApiResult<Value> {
        self.call("/books", RequestOptions::get().params(filters.params()))
            .await
    }

    pub async fn create_book(&self, book: BookInput) -> ApiResult<Value> {
        self.call("/books", book.into_options(Method::POST)).await
    }

    pub async fn update_book(&self, id: &str, book: BookInput) -> ApiResult<Value> {
        self.call(&format!("/books/{}", id), book.into_options(Method::PATCH))
            .await
    }

    pub async fn delete_book(&self, id: &str) -> ApiResult<Value> {
        self.delete(&format!("/books/{}", id)).await
    }

    // --- Libraries ---

    pub async fn get_libraries(&self, filters: &LibraryFilters) -> ApiResult<Value> {
        self.call("/libraries", RequestOptions::get().params(filters.params()))
            .await
    }

    pub async fn create_library(&self, library: &LibraryInput) -> ApiResult<Value> {
        let body = serde_json::to_value(library)?;
        self.call("/libraries", RequestOptions::new(Method::POST).json(body))
            .await
    }

    pub async fn update_library(&self, id: &str, library: &LibraryInput) -> ApiResult<Value> {
        let body = serde_json::to_value(library)?;
        self.call(
            &format!("/libraries/{}", id),
            RequestOptions::new(Method::PATCH).json(body),
        )
        .await
    }

    pub async fn delete_library(&self, id: &str) -> ApiResult<Value> {
        self.delete(&format!("/libraries/{}", id)).await
    }

    pub async fn get_library_books(&self, id: &str) -> ApiResult<Value> {
        self.call(&format!("/libraries/{}/books", id), RequestOptions::get())
            .await
    }

    // --- Assistant ---

    /// Raw `POST /chat` payload. The text to decode is under `data`.
    pub async fn get_chat_suggestions(&self, prompt: &ChatPrompt) -> ApiResult<Value> {
        let body = serde_json::to_value(prompt)?;
        self.call("/chat", RequestOptions::new(Method::POST).json(body))
            .await
    }

    /// Asks the assistant and decodes its answer, tagging each suggestion with `library_id`.
    pub async fn suggest(&self, prompt: &ChatPrompt, library_id: &str) -> ApiResult<Vec<Suggestion>> {
        let data = self.get_chat_suggestions(prompt).await?;
        Ok(match data.get("data").and_then(Value::as_str) {
            Some(raw) => self.parser.parse(raw, library_id),
            None => {
                log::warn!("Chat response carried no text");
                Vec::new()
            }
        })
    }

    pub async fn get_summary(&self, request: &SummaryRequest) -> ApiResult<String> {
        let body = serde_json::to_value(request)?;
        let data = self
            .call("/summary", RequestOptions::new(Method::POST).json(body))
            .await?;
        let text = ["summary", "data"]
            .iter()
            .find_map(|k| data.get(k).and_then(Value::as_str));
        Ok(match text {
            Some(t) => t.to_string(),
            None => {
                log::warn!("Summary response carried no text");
                String::new()
            }
        })
    }

    // --- Composites ---

    /// Libraries created by `user`.
    pub async fn my_libraries(&self, user: &CurrentUser) -> ApiResult<Vec<Library>> {
        let all = Library::list(&self.get_libraries(&LibraryFilters::default()).await?);
        Ok(ownership::owned_by(&all, Owner::from(user))
            .into_iter()
            .cloned()
            .collect())
    }

    /// Library id to attach to new suggestions for `user`.
    pub async fn suggestion_library(&self, user: &CurrentUser) -> ApiResult<String> {
        let owned = self.my_libraries(user).await?;
        Ok(ownership::suggestion_library_id(&owned.iter().collect::<Vec<_>>()))
    }

    /// Loads the user's books and all libraries concurrently. Fails if either fails.
    ///
    /// A user without an id owns no books, so the books fetch is skipped rather
    /// than sent unfiltered.
    pub async fn dashboard(&self, user: &CurrentUser) -> ApiResult<Dashboard> {
        let books = async {
            let Some(id) = &user.id else {
                log::warn!("Current user has no id, not loading their books");
                return Ok(Vec::new());
            };
            let filters = BookFilters {
                created_by: Some(id.clone()),
                ..BookFilters::default()
            };
            self.get_books(&filters).await.map(|data| Book::list(&data))
        };
        let all = LibraryFilters::default();
        let (books, libraries) = tokio::try_join!(books, self.get_libraries(&all))?;

        let libraries = Library::list(&libraries);
        let owned_libraries = ownership::owned_by(&libraries, Owner::from(user))
            .into_iter()
            .cloned()
            .collect();
        Ok(Dashboard {
            books,
            libraries,
            owned_libraries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Body;
    use serde_json::json;

    #[test]
    fn filters_only_emit_set_fields() {
        let f = BookFilters {
            created_by: Some("u1".into()),
            name: Some(String::new()),
            ..Default::default()
        };
        let params = f.params();
        assert_eq!(params.len(), 1);
        assert_eq!(params["created_by"], "u1");
        assert!(LibraryFilters::default().params().is_empty());
    }

    #[test]
    fn book_without_cover_is_json() {
        let input = BookInput {
            name: Some("Dune".into()),
            library: Some("l1".into()),
            ..Default::default()
        };
        match input.into_options(Method::POST).body {
            Some(Body::Json(v)) => assert_eq!(v, json!({"name": "Dune", "library": "l1"})),
            other => panic!("expected JSON body, got {other:?}"),
        }
    }

    #[test]
    fn book_with_cover_is_multipart() {
        let input = BookInput {
            name: Some("Dune".into()),
            category: Some("SF".into()),
            cover: Some(Attachment::new("c.jpg", vec![0u8; 4])),
            ..Default::default()
        };
        match input.into_options(Method::PATCH).body {
            Some(Body::Multipart(form)) => {
                assert_eq!(form.field("name"), Some("Dune"));
                assert_eq!(form.field("category"), Some("SF"));
                assert_eq!(form.field("library"), None);
                assert_eq!(form.parts().len(), 3);
            }
            other => panic!("expected multipart body, got {other:?}"),
        }
    }

    #[test]
    fn library_input_uses_backend_creator_key() {
        let input = LibraryInput {
            name: Some("Central".into()),
            address: Some("Main St".into()),
            category: None,
            created_by: Some(Creator {
                id: Some("u1".into()),
                username: Some("bob".into()),
            }),
        };
        assert_eq!(
            serde_json::to_value(&input).unwrap(),
            json!({"name": "Central", "address": "Main St", "Created_By": {"id": "u1", "username": "bob"}})
        );
    }

    #[test]
    fn empty_user_update_is_detected() {
        assert!(UserUpdate::default().is_empty());
        let u = UserUpdate {
            new_password: Some("s3cret".into()),
            ..Default::default()
        };
        assert!(!u.is_empty());
        assert_eq!(u.form().field("newPassword"), Some("s3cret"));
    }

    #[test]
    fn suggestion_becomes_book_input() {
        let s = Suggestion {
            name: Some("Emma".into()),
            author: Some("Austen".into()),
            library: Some("l3".into()),
            ..Default::default()
        };
        let input = BookInput::from(&s);
        assert_eq!(input.library.as_deref(), Some("l3"));
        assert!(input.cover.is_none());
    }
}
