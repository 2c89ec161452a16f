//! Tests for the typed error handling system
//!
//! These tests verify that:
//! - Errors return correct HTTP status codes
//! - Error responses are properly formatted
//! - Error conversions work correctly
//! - Error matching allows clients to handle specific cases

use axum::http::StatusCode;
use axum::response::IntoResponse;
use gist::core::error::{
    AccessError, ConfigError, EntityError, QueryError, SchemaError, StorageError,
};
use gist::prelude::*;

// =============================================================================
// HTTP Status Code Tests
// =============================================================================

mod status_code_tests {
    use super::*;

    #[test]
    fn test_object_not_found_returns_404() {
        let err = GistError::Entity(EntityError::NotFound {
            type_name: "User".to_string(),
            id: "u1".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_unknown_collection_returns_404() {
        let err = GistError::Entity(EntityError::UnknownCollection {
            collection: "widgets".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_query_errors_return_400() {
        let errors = [
            QueryError::MalformedFilter {
                clause: "name".to_string(),
            },
            QueryError::UnorderableProperty {
                property: "users".to_string(),
            },
            QueryError::InvalidParameter {
                name: "page".to_string(),
                value: "x".to_string(),
                message: "expected a positive number".to_string(),
            },
        ];
        for err in errors {
            assert_eq!(GistError::Query(err).status_code(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn test_schema_errors_return_409() {
        let err = GistError::Schema(SchemaError::UnknownProperty {
            property: "nickname".to_string(),
            type_name: "user".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::CONFLICT);

        let err = GistError::Schema(SchemaError::UnknownPreset {
            preset: ":everything".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_access_errors_return_403() {
        let err = GistError::Access(AccessError::FieldNotReadable {
            field: "email".to_string(),
            type_display: "User".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_storage_error_returns_500() {
        let err = GistError::Storage(StorageError::Unavailable {
            store: "objects".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_config_error_returns_500() {
        let err = GistError::Config(ConfigError::FileNotFound {
            path: "/etc/gist.yaml".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

// =============================================================================
// Error Message Tests
// =============================================================================

mod error_message_tests {
    use super::*;

    #[test]
    fn test_field_not_readable_message() {
        let err = GistError::Access(AccessError::FieldNotReadable {
            field: "email".to_string(),
            type_display: "User".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "Field 'email' is not readable as user is not allowed to view objects of type User."
        );
    }

    #[test]
    fn test_filter_messages_echo_the_clause() {
        let err = GistError::Query(QueryError::MissingArgument {
            filter: "name:eq:[]".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "Filter `name:eq:[]` uses a binary operator that does need an argument."
        );

        let err = GistError::Query(QueryError::MaliciousPattern {
            filter: "id:canaccess:[u1, rx]".to_string(),
        });
        assert!(err.to_string().contains("2 to 8 letters"));
    }

    #[test]
    fn test_not_found_message() {
        let err = GistError::Entity(EntityError::NotFound {
            type_name: "UserGroup".to_string(),
            id: "g9".to_string(),
        });
        assert_eq!(err.to_string(), "UserGroup with id 'g9' not found");
    }
}

// =============================================================================
// Error Code Tests
// =============================================================================

mod error_code_tests {
    use super::*;

    #[test]
    fn test_schema_error_codes() {
        assert_eq!(
            GistError::Schema(SchemaError::UnknownProperty {
                property: "x".to_string(),
                type_name: "user".to_string(),
            })
            .error_code(),
            "UNKNOWN_PROPERTY"
        );
        assert_eq!(
            GistError::Schema(SchemaError::NotPluckable {
                property: "userGroups".to_string(),
                type_name: "user".to_string(),
                reason: "not a persisted simple property".to_string(),
            })
            .error_code(),
            "NOT_PLUCKABLE"
        );
    }

    #[test]
    fn test_access_error_codes() {
        assert_eq!(
            GistError::Access(AccessError::ObjectNotReadable {
                type_display: "User".to_string(),
                id: "u1".to_string(),
            })
            .error_code(),
            "OBJECT_NOT_READABLE"
        );
        assert_eq!(
            GistError::Access(AccessError::FilterRequiresManage {
                filter: "id:canread:[u2]".to_string(),
            })
            .error_code(),
            "FILTER_REQUIRES_MANAGE"
        );
    }

    #[test]
    fn test_internal_error_code() {
        let err = GistError::Internal("lock poisoned".to_string());
        assert_eq!(err.error_code(), "INTERNAL_ERROR");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

// =============================================================================
// Error Response Format Tests
// =============================================================================

mod error_response_tests {
    use super::*;

    #[test]
    fn test_error_response_has_code_and_message() {
        let err = GistError::Query(QueryError::InvalidOrder {
            order: "name:sideways".to_string(),
        });
        let response = err.to_response();

        assert_eq!(response.code, "INVALID_ORDER");
        assert_eq!(
            response.message,
            "Order `name:sideways` must be of the form property[:asc|:desc]."
        );
        assert!(response.details.is_none());
    }

    #[test]
    fn test_error_response_includes_details_for_unknown_property() {
        let err = GistError::Schema(SchemaError::UnknownProperty {
            property: "nickname".to_string(),
            type_name: "user".to_string(),
        });
        let json = serde_json::to_value(err.to_response()).unwrap();

        assert_eq!(json["details"]["property"], "nickname");
        assert_eq!(json["details"]["type"], "user");
    }

    #[test]
    fn test_details_are_omitted_when_absent() {
        let err = GistError::Entity(EntityError::UnknownCollection {
            collection: "widgets".to_string(),
        });
        let json = serde_json::to_value(err.to_response()).unwrap();

        assert!(json.get("details").is_none());
    }
}

// =============================================================================
// Error Conversion Tests
// =============================================================================

mod error_conversion_tests {
    use super::*;

    #[test]
    fn test_fields_parse_error_converts_to_query_error() {
        let err: GistError = parse_fields("name]").unwrap_err().into();
        assert!(matches!(
            err,
            GistError::Query(QueryError::InvalidFields { .. })
        ));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_yaml_error_converts_to_config_error() {
        let err = GistConfig::from_yaml_str("types: [").unwrap_err();
        assert!(matches!(
            err,
            GistError::Config(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn test_anyhow_error_converts_to_internal() {
        let err: GistError = anyhow::anyhow!("store offline").into();
        assert!(matches!(err, GistError::Internal(ref msg) if msg == "store offline"));
    }
}

// =============================================================================
// IntoResponse Tests
// =============================================================================

mod into_response_tests {
    use super::*;

    #[test]
    fn test_not_found_into_response_status() {
        let err = GistError::Entity(EntityError::NotFound {
            type_name: "User".to_string(),
            id: "u1".to_string(),
        });

        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_access_error_into_response_status() {
        let err = GistError::Access(AccessError::ObjectNotReadable {
            type_display: "User".to_string(),
            id: "u1".to_string(),
        });

        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}

// =============================================================================
// GistService Error Integration Tests
// =============================================================================

mod service_error_tests {
    use super::*;

    fn service() -> GistService {
        let config = GistConfig::default_config();
        let registry = Arc::new(config.build_registry().unwrap());
        let store = InMemoryObjectStore::new(registry.clone());
        store
            .insert(GistObject::new("userGroup", "g1").with_value("name", "Admins"))
            .unwrap();
        GistService::new(
            registry,
            Arc::new(store),
            Arc::new(InMemoryIdentityProvider::new("x-user-id")),
            &config,
        )
    }

    fn request(pairs: &[(&str, &str)]) -> GistRequest {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        GistRequest::new(
            Caller::anonymous(),
            GistParams::from_pairs(&pairs).unwrap(),
            Mode::Gist,
            "/userGroups/gist",
        )
    }

    #[tokio::test]
    async fn test_unknown_preset_is_typed() {
        let err = service()
            .list("userGroups", &request(&[("fields", ":everything")]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GistError::Schema(SchemaError::UnknownPreset { .. })
        ));
    }

    #[tokio::test]
    async fn test_filter_argument_type_is_checked() {
        let err = service()
            .list("userGroups", &request(&[("filter", "users:gt:many")]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GistError::Query(QueryError::InvalidArgument { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_object_is_typed() {
        let err = service()
            .object("userGroups", "g2", &request(&[]))
            .await
            .unwrap_err();
        match err {
            GistError::Entity(EntityError::NotFound { type_name, id }) => {
                assert_eq!(type_name, "UserGroup");
                assert_eq!(id, "g2");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_successful_operations_return_ok() {
        let body = service()
            .object("userGroups", "g1", &request(&[("fields", "name")]))
            .await
            .unwrap();
        assert_eq!(body, serde_json::json!("Admins"));
    }
}
