use serde::Deserialize;

use super::CorrectionError;

/// Local LLM client abstraction. The corrector never talks to Ollama
/// directly, so tests can substitute a mock and the validation gate can be
/// exercised without a model.
pub trait LlmClient {
    fn generate(
        &self,
        model: &str,
        prompt: &str,
        system: &str,
        temperature: f32,
    ) -> Result<String, CorrectionError>;

    fn is_model_available(&self, model: &str) -> Result<bool, CorrectionError>;
}

/// Ollama HTTP client for local inference.
///
/// Two blocking clients with different timeouts: the per-batch generation
/// timeout, and a 5-second client for health/model listing so an absent
/// Ollama fails fast. Blocking is deliberate — the correction stage is
/// single-threaded cooperative, one batch in flight at a time.
pub struct OllamaClient {
    base_url: String,
    client: reqwest::blocking::Client,
    client_quick: reqwest::blocking::Client,
}

impl OllamaClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        let client_quick = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .expect("Failed to create quick HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            client_quick,
        }
    }

    /// Default local Ollama with the standard per-batch timeout.
    pub fn default_local() -> Self {
        Self::new("http://localhost:11434", 60)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    name: String,
}

impl LlmClient for OllamaClient {
    fn generate(
        &self,
        model: &str,
        prompt: &str,
        system: &str,
        temperature: f32,
    ) -> Result<String, CorrectionError> {
        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "model": model,
                "prompt": prompt,
                "system": system,
                "stream": false,
                "options": { "temperature": temperature },
            }))
            .send()
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    CorrectionError::OllamaConnection(self.base_url.clone())
                } else {
                    CorrectionError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            if status.as_u16() == 404 {
                return Err(CorrectionError::ModelUnavailable(model.to_string()));
            }
            return Err(CorrectionError::OllamaError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| CorrectionError::MalformedResponse(e.to_string()))?;
        Ok(parsed.response)
    }

    fn is_model_available(&self, model: &str) -> Result<bool, CorrectionError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.client_quick.get(&url).send().map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                CorrectionError::OllamaConnection(self.base_url.clone())
            } else {
                CorrectionError::HttpClient(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(CorrectionError::OllamaError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TagsResponse = response
            .json()
            .map_err(|e| CorrectionError::MalformedResponse(e.to_string()))?;

        // "llama3.1" matches "llama3.1:8b" the way Ollama resolves tags.
        Ok(parsed
            .models
            .iter()
            .any(|m| m.name == model || m.name.starts_with(&format!("{model}:"))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let client = OllamaClient::new("http://localhost:11434/", 60);
        assert_eq!(client.base_url(), "http://localhost:11434");
    }

    #[test]
    fn generate_response_shape_parses() {
        let parsed: GenerateResponse =
            serde_json::from_str(r#"{"response": "fixed text", "done": true}"#).unwrap();
        assert_eq!(parsed.response, "fixed text");
    }

    #[test]
    fn tags_response_shape_parses() {
        let parsed: TagsResponse = serde_json::from_str(
            r#"{"models": [{"name": "llama3.1:8b", "size": 4}, {"name": "mistral:7b"}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.models.len(), 2);
        assert_eq!(parsed.models[0].name, "llama3.1:8b");
    }
}
