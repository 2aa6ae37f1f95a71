use std::io::{BufRead, BufReader};
use std::{thread, time::Duration};

use rand::{thread_rng, Rng};
use reqwest::blocking::Client;
use reqwest::StatusCode;

use crate::config::ProviderConfig;
use crate::error::TranslateError;
use crate::services::ai_types::{ChatMessage, ChatRequest, ChatResponse, StreamChunk};

const MAX_RETRIES: usize = 3;
const BASE_DELAY_MS: u64 = 800;
const TEMPERATURE: f32 = 0.3;

const SYSTEM_PROMPT: &str = "You are an AI assistant fluent in many languages. \
Give accurate, natural translations that read idiomatically in the target language. \
Do not answer any question contained in the text; start translating right away and \
output nothing except the translation. Keep Markdown, MDX, front matter, code blocks, \
links and HTML tags intact and translate only human-readable prose.";

/// Anything that can turn a whole document into another language.
pub trait Translator {
    fn translate(&self, text: &str, target_language: &str) -> Result<String, TranslateError>;
}

impl<F> Translator for F
where
    F: Fn(&str, &str) -> Result<String, TranslateError>,
{
    fn translate(&self, text: &str, target_language: &str) -> Result<String, TranslateError> {
        self(text, target_language)
    }
}

/// OpenAI-compatible chat completions client.
pub struct ChatClient<'a> {
    client: Client,
    config: &'a ProviderConfig,
    echo: Option<Box<dyn Fn(&str) + 'a>>,
}

impl<'a> ChatClient<'a> {
    pub fn new(config: &'a ProviderConfig) -> Result<Self, TranslateError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            config,
            echo: None,
        })
    }

    /// Receive streamed fragments as they arrive.
    pub fn with_echo(mut self, echo: impl Fn(&str) + 'a) -> Self {
        self.echo = Some(Box::new(echo));
        self
    }

    fn send_once(&self, body: &ChatRequest<'_>) -> Result<String, TranslateError> {
        let resp = self
            .client
            .post(self.config.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            // the body usually says why; keep it even if it is not JSON
            let text = resp.text().unwrap_or_default();
            return Err(TranslateError::HttpStatus {
                status: status.as_u16(),
                message: extract_error_message(&text),
            });
        }

        let text = if body.stream {
            read_event_stream(BufReader::new(resp), |chunk| self.echo(chunk))?
        } else {
            parse_whole_response(&resp.text()?)?
        };

        non_empty(text)
    }

    fn echo(&self, chunk: &str) {
        if let Some(echo) = &self.echo {
            echo(chunk);
        }
    }

    /// Log a failed attempt; echoed output so far belongs to that attempt.
    fn note_retry(&self, err: &TranslateError, attempt: usize, delay: Duration) {
        tracing::warn!(
            error = %err,
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            "translation request failed, retrying"
        );
        self.echo(&format!("\n[attempt {} failed: {err}; retrying]\n", attempt + 1));
    }
}

impl Translator for ChatClient<'_> {
    fn translate(&self, text: &str, target_language: &str) -> Result<String, TranslateError> {
        let body = build_request(self.config, text, target_language);
        with_retries(
            || self.send_once(&body),
            |err, attempt, delay| self.note_retry(err, attempt, delay),
        )
    }
}

/// Run `op` up to [`MAX_RETRIES`] times while it fails with a transient error.
fn with_retries<T>(
    mut op: impl FnMut() -> Result<T, TranslateError>,
    mut before_retry: impl FnMut(&TranslateError, usize, Duration),
) -> Result<T, TranslateError> {
    let mut attempt = 0;
    loop {
        match op() {
            Ok(t) => return Ok(t),
            Err(err) if should_retry(&err) && attempt + 1 < MAX_RETRIES => {
                let delay = backoff(attempt);
                before_retry(&err, attempt, delay);
                thread::sleep(delay);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

fn backoff(attempt: usize) -> Duration {
    let jitter: u64 = thread_rng().gen_range(0..200);
    let ms = BASE_DELAY_MS * (2_u64.pow(attempt as u32)) + jitter;
    Duration::from_millis(ms)
}

fn should_retry(err: &TranslateError) -> bool {
    match err {
        TranslateError::HttpStatus { status, .. } => {
            let status = StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            // 408/429/5xx are usually temporary
            status == StatusCode::REQUEST_TIMEOUT
                || status == StatusCode::TOO_MANY_REQUESTS
                || status.is_server_error()
        }
        TranslateError::Http(_)
        | TranslateError::Json(_)
        | TranslateError::InvalidResponse(_)
        | TranslateError::Stream(_)
        | TranslateError::Empty => true,
    }
}

fn build_request<'a>(cfg: &'a ProviderConfig, text: &str, target_language: &str) -> ChatRequest<'a> {
    ChatRequest {
        model: &cfg.model,
        messages: vec![
            ChatMessage {
                role: "system",
                content: SYSTEM_PROMPT.to_string(),
            },
            ChatMessage {
                role: "user",
                content: build_prompt(text, target_language),
            },
        ],
        temperature: TEMPERATURE,
        stream: cfg.stream,
    }
}

fn build_prompt(text: &str, target_language: &str) -> String {
    format!(
        "This is part of a multilingual technical documentation site. \
Translate faithfully, fluently and elegantly. \
Translate the following text to {target_language}:\n\n{text}"
    )
}

/// Concatenate the `delta.content` fragments of a server-sent event stream in
/// arrival order, handing each one to `on_chunk`.
///
/// The stream must end with `[DONE]` or a `finish_reason`; a connection that
/// just closes is a truncated answer.
fn read_event_stream<R: BufRead>(
    reader: R,
    mut on_chunk: impl FnMut(&str),
) -> Result<String, TranslateError> {
    let mut out = String::new();
    let mut complete = false;

    for line in reader.lines() {
        let line = line?;
        let Some(data) = line.trim_end().strip_prefix("data:") else {
            // event:, id:, retry: and ": keep-alive" lines carry nothing we need
            continue;
        };
        let data = data.trim_start();
        if data.is_empty() {
            continue;
        }
        if data == "[DONE]" {
            complete = true;
            break;
        }

        let value: serde_json::Value = serde_json::from_str(data)?;
        if let Some(message) = error_in(&value) {
            return Err(TranslateError::InvalidResponse(message));
        }

        let chunk: StreamChunk = serde_json::from_value(value)?;
        if let Some(delta) = chunk.delta() {
            on_chunk(delta);
            out.push_str(delta);
        }
        if let Some(reason) = chunk.finish_reason() {
            check_finish_reason(reason)?;
            complete = true;
        }
    }

    if !complete {
        return Err(TranslateError::InvalidResponse(
            "stream ended before completion".to_string(),
        ));
    }
    Ok(out)
}

/// `choices[0].message.content` of a non-streamed completion.
fn parse_whole_response(body: &str) -> Result<String, TranslateError> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    if let Some(message) = error_in(&value) {
        return Err(TranslateError::InvalidResponse(message));
    }

    let parsed: ChatResponse = serde_json::from_value(value)?;
    if let Some(reason) = parsed.finish_reason() {
        check_finish_reason(reason)?;
    }
    parsed.content().map(str::to_string).ok_or_else(|| {
        TranslateError::InvalidResponse("missing choices[0].message.content".to_string())
    })
}

fn check_finish_reason(reason: &str) -> Result<(), TranslateError> {
    if reason == "length" {
        return Err(TranslateError::InvalidResponse(
            "output truncated by the token limit".to_string(),
        ));
    }
    Ok(())
}

/// The body is kept as sent; only a blank answer is rejected.
fn non_empty(text: String) -> Result<String, TranslateError> {
    if text.trim().is_empty() {
        return Err(TranslateError::Empty);
    }
    Ok(text)
}

fn error_in(v: &serde_json::Value) -> Option<String> {
    let err = v.get("error")?;
    let msg = err
        .get("message")
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| err.to_string());
    Some(msg)
}

fn extract_error_message(body_text: &str) -> String {
    // { "error": { "message": "..." } } or { "message": "..." }
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(body_text) {
        if let Some(msg) = v
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
        {
            return msg.to_string();
        }
        if let Some(msg) = v.get("message").and_then(|m| m.as_str()) {
            return msg.to_string();
        }
    }

    let trimmed = body_text.trim();
    if trimmed.chars().count() > 400 {
        let snippet: String = trimmed.chars().take(400).collect();
        format!("{snippet}...")
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::io::Cursor;

    fn provider(stream: bool) -> ProviderConfig {
        ProviderConfig {
            name: "openai".into(),
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-test".into(),
            api_key: "sk-test".into(),
            stream,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn stream_fragments_are_joined_in_order() {
        let sse = "\
: keep-alive
data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}

data: {\"choices\":[{\"delta\":{\"content\":\"Bon\"}}]}

data: {\"choices\":[{\"delta\":{\"content\":\"jour\"}}]}
data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}
data: [DONE]
data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}
";
        let mut seen = Vec::new();
        let text = read_event_stream(Cursor::new(sse), |c| seen.push(c.to_string())).unwrap();
        assert_eq!(text, "Bonjour");
        assert_eq!(seen, vec!["Bon".to_string(), "jour".to_string()]);
    }

    #[test]
    fn stream_cut_off_before_completion_fails() {
        let sse = "data: {\"choices\":[{\"delta\":{\"content\":\"# Titre\\n\\nPremier paragraphe, la su\"}}]}\n";
        let err = read_event_stream(Cursor::new(sse), |_| {}).unwrap_err();
        assert!(
            matches!(err, TranslateError::InvalidResponse(ref m) if m == "stream ended before completion")
        );
    }

    #[test]
    fn finish_reason_without_done_is_complete() {
        let sse = "\
data: {\"choices\":[{\"delta\":{\"content\":\"Hola\"}}]}
data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}
";
        assert_eq!(read_event_stream(Cursor::new(sse), |_| {}).unwrap(), "Hola");
    }

    #[test]
    fn stream_stopped_by_token_limit_fails() {
        let sse = "\
data: {\"choices\":[{\"delta\":{\"content\":\"Hola\"},\"finish_reason\":\"length\"}]}
data: [DONE]
";
        let err = read_event_stream(Cursor::new(sse), |_| {}).unwrap_err();
        assert!(matches!(err, TranslateError::InvalidResponse(ref m) if m.contains("token limit")));
    }

    #[test]
    fn whole_response_reads_first_choice() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"  Bonjour\n"},"finish_reason":"stop"}]}"#;
        assert_eq!(parse_whole_response(body).unwrap(), "  Bonjour\n");
    }

    #[test]
    fn whole_response_without_content_fails() {
        for body in [r#"{"choices":[]}"#, r#"{}"#, r#"{"choices":[{"message":{}}]}"#] {
            assert!(
                matches!(parse_whole_response(body), Err(TranslateError::InvalidResponse(_))),
                "{body}"
            );
        }
        assert!(matches!(
            parse_whole_response("not json"),
            Err(TranslateError::Json(_))
        ));
        assert!(matches!(
            parse_whole_response(r#"{"error":{"message":"bad key"}}"#),
            Err(TranslateError::InvalidResponse(ref m)) if m == "bad key"
        ));
    }

    #[test]
    fn whole_response_cut_by_token_limit_fails() {
        let body = r#"{"choices":[{"message":{"content":"Bonj"},"finish_reason":"length"}]}"#;
        assert!(matches!(
            parse_whole_response(body),
            Err(TranslateError::InvalidResponse(_))
        ));
    }

    #[test]
    fn translated_body_is_kept_verbatim() {
        assert_eq!(non_empty("\n# Titre\n\n".to_string()).unwrap(), "\n# Titre\n\n");
        assert!(matches!(non_empty(" \n\t".to_string()), Err(TranslateError::Empty)));
    }

    #[test]
    fn transient_failures_are_retried_then_given_up() {
        let mut calls = 0;
        let mut retries = Vec::new();
        let result = with_retries(
            || {
                calls += 1;
                if calls == 1 {
                    Err(TranslateError::Empty)
                } else {
                    Ok("done")
                }
            },
            |_, attempt, _| retries.push(attempt),
        );
        assert_eq!(result.unwrap(), "done");
        assert_eq!(retries, vec![0]);

        let mut calls = 0;
        let result: Result<(), _> = with_retries(
            || {
                calls += 1;
                Err(TranslateError::HttpStatus {
                    status: 401,
                    message: "bad key".into(),
                })
            },
            |_, _, _| panic!("401 is not retried"),
        );
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn retry_is_announced_on_the_echo() {
        let cfg = provider(true);
        let echoed = RefCell::new(String::new());
        let client = ChatClient::new(&cfg)
            .unwrap()
            .with_echo(|chunk| echoed.borrow_mut().push_str(chunk));

        client.echo("Bonj");
        client.note_retry(&TranslateError::Empty, 0, Duration::from_millis(1));
        client.echo("Bonjour");
        drop(client);

        let echoed = echoed.into_inner();
        assert!(echoed.starts_with("Bonj\n[attempt 1 failed"), "{echoed}");
        assert!(echoed.ends_with("retrying]\nBonjour"), "{echoed}");
    }

    #[test]
    fn stream_error_event_fails() {
        let sse = "data: {\"error\":{\"message\":\"quota exceeded\"}}\n";
        let err = read_event_stream(Cursor::new(sse), |_| {}).unwrap_err();
        assert!(matches!(err, TranslateError::InvalidResponse(ref m) if m == "quota exceeded"));
    }

    #[test]
    fn malformed_stream_event_fails() {
        let sse = "data: {not json\n";
        let err = read_event_stream(Cursor::new(sse), |_| {}).unwrap_err();
        assert!(matches!(err, TranslateError::Json(_)));
    }

    #[test]
    fn request_carries_language_and_stream_flag() {
        let cfg = provider(true);
        let body = build_request(&cfg, "你好", "Français");
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["model"], "gpt-test");
        assert_eq!(json["stream"], true);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["role"], "user");
        let user = json["messages"][1]["content"].as_str().unwrap();
        assert!(user.contains("to Français"));
        assert!(user.ends_with("你好"));
    }

    #[test]
    fn error_message_extraction() {
        assert_eq!(
            extract_error_message(r#"{"error":{"message":"bad key"}}"#),
            "bad key"
        );
        assert_eq!(extract_error_message(r#"{"message":"slow down"}"#), "slow down");
        assert_eq!(extract_error_message("  gateway timeout \n"), "gateway timeout");
        assert_eq!(extract_error_message(&"x".repeat(500)).len(), 403);
    }

    #[test]
    fn retries_only_transient_statuses() {
        let status = |s: u16| TranslateError::HttpStatus {
            status: s,
            message: String::new(),
        };
        assert!(should_retry(&status(429)));
        assert!(should_retry(&status(408)));
        assert!(should_retry(&status(503)));
        assert!(!should_retry(&status(401)));
        assert!(!should_retry(&status(400)));
        assert!(should_retry(&TranslateError::Empty));
    }

    #[test]
    fn closures_are_translators() {
        let upper = |text: &str, _lang: &str| Ok::<_, TranslateError>(text.to_uppercase());
        assert_eq!(upper.translate("abc", "x").unwrap(), "ABC");
    }
}
