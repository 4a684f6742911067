use crate::collectors::cycle::Orchestrator;
use crate::database::{Connector, Session};
use crate::exporter::GIT_COMMIT_HASH;
use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

#[derive(Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    database: String,
}

// Open and close one session against the target
async fn check_database_health<C: Connector>(connector: &C) -> Result<(), StatusCode> {
    match connector.open().await {
        Ok(session) => {
            session.close().await;
            Ok(())
        }
        Err(error) => {
            error!("Failed to open database session: {}", error);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

fn create_health_response(db_result: &Result<(), StatusCode>) -> Health {
    Health {
        commit: GIT_COMMIT_HASH.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if db_result.is_ok() {
            "ok".to_string()
        } else {
            "error".to_string()
        },
    }
}

fn create_response_body(method: &Method, health: &Health) -> Body {
    if method == Method::GET {
        Json(health).into_response().into_body()
    } else {
        Body::empty()
    }
}

// X-App: name:version:shortsha
fn create_app_headers(health: &Health) -> HeaderMap {
    let short_hash = health.commit.get(..7).unwrap_or("");

    let header_value = format!("{}:{}:{}", health.name, health.version, short_hash);

    match header_value.parse::<HeaderValue>() {
        Ok(x_app_header_value) => {
            let mut headers = HeaderMap::new();
            headers.insert("X-App", x_app_header_value);
            headers
        }
        Err(err) => {
            debug!("Failed to parse X-App header: {}", err);
            HeaderMap::new()
        }
    }
}

pub async fn health<C: Connector>(
    method: Method,
    Extension(orchestrator): Extension<Orchestrator<C>>,
) -> impl IntoResponse {
    let db_result = check_database_health(orchestrator.connector()).await;
    let health = create_health_response(&db_result);
    let body = create_response_body(&method, &health);
    let headers = create_app_headers(&health);

    match db_result {
        Ok(()) => (StatusCode::OK, headers, body),
        Err(status_code) => (status_code, headers, body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_database_field() {
        assert_eq!(create_health_response(&Ok(())).database, "ok");
        assert_eq!(
            create_health_response(&Err(StatusCode::SERVICE_UNAVAILABLE)).database,
            "error"
        );
    }

    #[test]
    fn test_app_header_short_hash() {
        let health = Health {
            commit: "0123456789abcdef".to_string(),
            name: "pgscrape_exporter".to_string(),
            version: "0.1.0".to_string(),
            database: "ok".to_string(),
        };

        let headers = create_app_headers(&health);
        assert_eq!(
            headers.get("X-App").unwrap(),
            "pgscrape_exporter:0.1.0:0123456"
        );
    }

    #[test]
    fn test_app_header_fallback_hash() {
        let health = Health {
            commit: ":-(".to_string(),
            name: "pgscrape_exporter".to_string(),
            version: "0.1.0".to_string(),
            database: "error".to_string(),
        };

        let headers = create_app_headers(&health);
        assert_eq!(headers.get("X-App").unwrap(), "pgscrape_exporter:0.1.0:");
    }

    #[test]
    fn test_options_body_is_empty() {
        let health = create_health_response(&Ok(()));
        let body = create_response_body(&Method::OPTIONS, &health);
        assert_eq!(axum::body::HttpBody::size_hint(&body).exact(), Some(0));
    }
}
