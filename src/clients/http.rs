use std::time::Duration;

use serde_json::Value;

use crate::error::FetchError;

/// Raw page/API access; the only place requests leave the process.
pub trait PageFetcher {
    fn get_text(&self, url: &str) -> Result<String, FetchError>;
}

/// Blocking HTTP client sending the configured user agent on every request.
pub struct HttpFetcher {
    agent: ureq::Agent,
    user_agent: String,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout)
            .build();

        Self {
            agent,
            user_agent: user_agent.to_string(),
        }
    }

    pub fn post_json(
        &self,
        url: &str,
        bearer_token: &str,
        body: &Value,
    ) -> Result<Value, FetchError> {
        let response = self
            .agent
            .post(url)
            .set("User-Agent", &self.user_agent)
            .set("Authorization", &format!("Bearer {bearer_token}"))
            .send_json(body)?;
        let text = response.into_string()?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl PageFetcher for HttpFetcher {
    fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .agent
            .get(url)
            .set("User-Agent", &self.user_agent)
            .call()?;
        Ok(response.into_string()?)
    }
}

/// Substitutes `{NAME}` placeholders in a URL template.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    values
        .iter()
        .fold(template.to_string(), |acc, (name, value)| {
            acc.replace(&format!("{{{name}}}"), value)
        })
}
