use serde_json::{Map, Value};

use crate::core::errors::ApiError;

pub fn validate_config(config: &Value) -> Result<(), ApiError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(app) = expect_optional_object(root, "app")? {
        validate_optional_string_field(app, "app.session_prefix", "session_prefix")?;
    }

    if let Some(corpus) = expect_optional_object(root, "corpus")? {
        validate_optional_string_field(corpus, "corpus.dir", "dir")?;
        validate_optional_string_field(corpus, "corpus.documents_subdir", "documents_subdir")?;
        validate_u64_field(corpus, "corpus.chunk_size", "chunk_size", 50, 100_000)?;
        validate_u64_field(corpus, "corpus.chunk_overlap", "chunk_overlap", 0, 50_000)?;
        let size = corpus.get("chunk_size").and_then(|v| v.as_u64()).unwrap_or(1000);
        let overlap = corpus.get("chunk_overlap").and_then(|v| v.as_u64()).unwrap_or(200);
        if overlap >= size {
            return Err(ApiError::BadRequest(
                "Invalid config at 'corpus.chunk_overlap': must be smaller than chunk_size"
                    .to_string(),
            ));
        }
    }

    if let Some(retrieval) = expect_optional_object(root, "retrieval")? {
        validate_u64_field(retrieval, "retrieval.top_k", "top_k", 1, 100)?;
        validate_u64_field(
            retrieval,
            "retrieval.previous_passages",
            "previous_passages",
            0,
            100,
        )?;
        validate_u64_field(
            retrieval,
            "retrieval.prompt_passages",
            "prompt_passages",
            1,
            100,
        )?;
        validate_u64_field(
            retrieval,
            "retrieval.passage_char_budget",
            "passage_char_budget",
            1,
            1_000_000,
        )?;
        validate_f64_field(
            retrieval,
            "retrieval.contextual_similarity_floor",
            "contextual_similarity_floor",
            0.0,
            1.0,
        )?;
    }

    if let Some(llm) = expect_optional_object(root, "llm")? {
        validate_optional_string_field(llm, "llm.base_url", "base_url")?;
        validate_optional_string_field(llm, "llm.model", "model")?;
        validate_optional_string_field(llm, "llm.api_key", "api_key")?;
        validate_bool_field(llm, "llm.require_api_key", "require_api_key")?;
        validate_u64_field(llm, "llm.max_tokens", "max_tokens", 1, 1_000_000)?;
        validate_f64_field(llm, "llm.temperature", "temperature", 0.0, 2.0)?;
        validate_u64_field(llm, "llm.timeout_secs", "timeout_secs", 1, 86_400)?;
    }

    if let Some(embedding) = expect_optional_object(root, "embedding")? {
        validate_optional_string_field(embedding, "embedding.base_url", "base_url")?;
        validate_optional_string_field(embedding, "embedding.model", "model")?;
        validate_u64_field(embedding, "embedding.batch_size", "batch_size", 1, 4096)?;
        validate_u64_field(embedding, "embedding.timeout_secs", "timeout_secs", 1, 86_400)?;
    }

    if let Some(server) = expect_optional_object(root, "server")? {
        validate_optional_string_field(server, "server.host", "host")?;
        validate_u64_field(server, "server.port", "port", 0, 65535)?;
        validate_optional_string_field(server, "server.session_name", "session_name")?;
        validate_string_array_field(
            server,
            "server.cors_allowed_origins",
            "cors_allowed_origins",
        )?;
    }

    if let Some(classifier) = expect_optional_object(root, "classifier")? {
        validate_string_array_field(classifier, "classifier.keywords", "keywords")?;
        validate_string_array_field(classifier, "classifier.starters", "starters")?;
    }

    Ok(())
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ApiError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(config_type_error(key, "object")),
        None => Ok(None),
    }
}

fn validate_bool_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.as_bool().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "boolean"))
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_f64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: f64,
    max: f64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_f64() else {
        return Err(config_type_error(path, "number"));
    };
    if number < min || number > max {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.is_null() || value.as_str().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "string"))
}

fn validate_string_array_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(items) = value.as_array() else {
        return Err(config_type_error(path, "array of strings"));
    };
    for (index, item) in items.iter().enumerate() {
        let Some(text) = item.as_str() else {
            return Err(config_type_error(&format!("{}[{}]", path, index), "string"));
        };
        if text.trim().is_empty() {
            return Err(ApiError::BadRequest(format!(
                "Invalid config at '{}[{}]': value cannot be empty",
                path, index
            )));
        }
    }
    Ok(())
}

fn config_type_error(path: &str, expected: &str) -> ApiError {
    ApiError::BadRequest(format!(
        "Invalid config at '{}': expected {}",
        path, expected
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_basic_valid_shape() {
        let config = json!({
            "corpus": { "dir": "Corpus", "chunk_size": 1000, "chunk_overlap": 200 },
            "retrieval": { "top_k": 5, "contextual_similarity_floor": 0.4 },
            "llm": { "model": "codestral-latest", "require_api_key": true, "temperature": 0.1 },
            "server": { "port": 5000, "cors_allowed_origins": ["http://localhost:5173"] },
            "classifier": { "keywords": ["this", "that"] }
        });

        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn rejects_wrong_section_type() {
        let config = json!({ "retrieval": 5 });
        assert!(matches!(
            validate_config(&config),
            Err(ApiError::BadRequest(msg)) if msg.contains("retrieval")
        ));
    }

    #[test]
    fn rejects_overlap_not_smaller_than_chunk() {
        let config = json!({ "corpus": { "chunk_size": 100, "chunk_overlap": 100 } });
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_empty_keyword() {
        let config = json!({ "classifier": { "keywords": ["this", "  "] } });
        assert!(validate_config(&config).is_err());
    }
}
