use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{ApiToken, MigrateConfig};

pub const PAGE_EDITOR: &str = "markdown";

pub const CREATE_PAGE_MUTATION: &str = r#"
mutation (
  $content: String!,
  $description: String!,
  $editor: String!,
  $isPublished: Boolean!,
  $isPrivate: Boolean!,
  $locale: String!,
  $path: String!,
  $title: String!,
  $tags: [String]!
) {
  pages {
    create(
      content: $content,
      description: $description,
      editor: $editor,
      isPublished: $isPublished,
      isPrivate: $isPrivate,
      locale: $locale,
      path: $path,
      title: $title,
      tags: $tags
    ) {
      responseResult {
        succeeded
        errorCode
        slug
        message
      }
      page {
        id
        path
        title
        isPrivate
        isPublished
      }
    }
  }
}
"#;

/// One page to create: the sanitized title, the file text and the category it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub title: String,
    pub content: String,
    pub description: String,
}

impl PageRequest {
    /// Remote path, `/{description}/{title}`.
    pub fn path(&self) -> String {
        page_path(&self.description, &self.title)
    }
}

/// Remote path a page with this description and title is created at.
pub fn page_path(description: &str, title: &str) -> String {
    format!("/{description}/{title}")
}

/// Classified outcome of a single `pages.create` call.
#[derive(Debug, Clone, PartialEq)]
pub enum PageResult {
    Created {
        path: String,
        title: String,
    },
    RemoteRejected {
        message: String,
        /// Passed through as sent; the wiki does not guarantee an integer here.
        error_code: Option<Value>,
    },
    GraphqlError {
        errors: Value,
    },
    /// Connection failure, timeout, or a non-2xx status. `status` is absent when no response arrived.
    TransportError {
        status: Option<u16>,
        body: String,
    },
    /// 2xx response that is not JSON or lacks the `data.pages.create.responseResult` shape.
    MalformedResponse {
        detail: String,
    },
}

impl PageResult {
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created { .. })
    }
}

impl fmt::Display for PageResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created { path, title } => write!(f, "page '{title}' created at {path}"),
            Self::RemoteRejected {
                message,
                error_code,
            } => match error_code {
                Some(code) => write!(f, "page creation failed [{code}]: {message}"),
                None => write!(f, "page creation failed: {message}"),
            },
            Self::GraphqlError { errors } => write!(f, "GraphQL error: {errors}"),
            Self::TransportError {
                status: Some(status),
                body,
            } => write!(f, "HTTP error {status}: {body}"),
            Self::TransportError { status: None, body } => write!(f, "transport error: {body}"),
            Self::MalformedResponse { detail } => write!(f, "unexpected response: {detail}"),
        }
    }
}

/// Remote side of the migration. `Sync` so a worker pool can share one client.
pub trait PageApi: Sync {
    fn create_page(&self, request: &PageRequest) -> PageResult;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePageVariables<'a> {
    content: &'a str,
    description: &'a str,
    editor: &'a str,
    is_published: bool,
    is_private: bool,
    locale: &'a str,
    path: String,
    title: &'a str,
    tags: Vec<String>,
}

#[derive(Debug, Serialize)]
struct GraphqlRequest<'a> {
    query: &'a str,
    variables: CreatePageVariables<'a>,
}

/// JSON body for the `pages.create` mutation with the fixed page defaults applied.
pub fn build_request_body(request: &PageRequest, locale: &str) -> Result<Value> {
    let body = GraphqlRequest {
        query: CREATE_PAGE_MUTATION,
        variables: CreatePageVariables {
            content: &request.content,
            description: &request.description,
            editor: PAGE_EDITOR,
            is_published: true,
            is_private: false,
            locale,
            path: request.path(),
            title: &request.title,
            tags: Vec::new(),
        },
    };
    serde_json::to_value(body).context("failed to encode pages.create request")
}

/// Map an HTTP status and raw body to a `PageResult`.
///
/// Priority: non-2xx status, then a top-level `errors` field, then
/// `data.pages.create.responseResult.succeeded`. Anything else is `MalformedResponse`.
pub fn classify_response(status: u16, body: &str) -> PageResult {
    if !(200..300).contains(&status) {
        return PageResult::TransportError {
            status: Some(status),
            body: body.to_string(),
        };
    }

    let payload: Value = match serde_json::from_str(body) {
        Ok(payload) => payload,
        Err(error) => {
            return PageResult::MalformedResponse {
                detail: format!("response body is not JSON: {error}"),
            };
        }
    };
    if let Some(errors) = payload.get("errors") {
        return PageResult::GraphqlError {
            errors: errors.clone(),
        };
    }

    let parsed: CreateResponse = match serde_json::from_value(payload) {
        Ok(parsed) => parsed,
        Err(error) => {
            return PageResult::MalformedResponse {
                detail: format!("failed to decode pages.create response: {error}"),
            };
        }
    };
    let Some(create) = parsed
        .data
        .and_then(|data| data.pages)
        .and_then(|pages| pages.create)
    else {
        return PageResult::MalformedResponse {
            detail: "missing data.pages.create".to_string(),
        };
    };
    let Some(response_result) = create.response_result else {
        return PageResult::MalformedResponse {
            detail: "missing responseResult".to_string(),
        };
    };

    match response_result.succeeded {
        Some(true) => match create.page {
            Some(PagePayload {
                path: Some(path),
                title: Some(title),
            }) => PageResult::Created { path, title },
            _ => PageResult::MalformedResponse {
                detail: "creation succeeded but page path/title is missing".to_string(),
            },
        },
        Some(false) => PageResult::RemoteRejected {
            message: response_result
                .message
                .unwrap_or_else(|| "no message".to_string()),
            error_code: response_result.error_code,
        },
        None => PageResult::MalformedResponse {
            detail: "missing responseResult.succeeded".to_string(),
        },
    }
}

/// `PageApi` over HTTPS: one blocking JSON POST per page, never retried.
pub struct GraphqlClient {
    client: Client,
    api_url: String,
    token: ApiToken,
    locale: String,
    user_agent: String,
}

impl GraphqlClient {
    pub fn new(config: &MigrateConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .context("failed to build GraphQL HTTP client")?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            token: config.token.clone(),
            locale: config.locale.clone(),
            user_agent: config.user_agent.clone(),
        })
    }
}

impl PageApi for GraphqlClient {
    fn create_page(&self, request: &PageRequest) -> PageResult {
        let body = match build_request_body(request, &self.locale) {
            Ok(body) => body,
            Err(error) => {
                return PageResult::TransportError {
                    status: None,
                    body: format!("{error:#}"),
                };
            }
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(self.token.expose())
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, self.user_agent.clone())
            .json(&body)
            .send();

        match response {
            Ok(response) => {
                let status = response.status().as_u16();
                match response.text() {
                    Ok(text) => classify_response(status, &text),
                    Err(error) => PageResult::TransportError {
                        status: Some(status),
                        body: format!("failed to read response body: {error}"),
                    },
                }
            }
            Err(error) => PageResult::TransportError {
                status: error.status().map(|status| status.as_u16()),
                body: error.to_string(),
            },
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct CreateResponse {
    data: Option<DataPayload>,
}

#[derive(Debug, Deserialize, Default)]
struct DataPayload {
    pages: Option<PagesPayload>,
}

#[derive(Debug, Deserialize, Default)]
struct PagesPayload {
    create: Option<CreatePayload>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct CreatePayload {
    response_result: Option<ResponseResultPayload>,
    page: Option<PagePayload>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ResponseResultPayload {
    succeeded: Option<bool>,
    error_code: Option<Value>,
    message: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct PagePayload {
    path: Option<String>,
    title: Option<String>,
}
