use crate::errors::{CleanupError, CleanupResult, ConfigField};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "na-api-alexa.amazon.com";
pub const DEFAULT_FILTER_TEXT: &str = "Home Assistant";
pub const ENTITIES_SKILL_ID: &str = "amzn1.ask.1p.smarthome";
pub const USER_AGENT: &str =
    "AppleWebKit PitanguiBridge/2.2.635412.0-[HARDWARE=iPhone17_3][SOFTWARE=18.2][DEVICE=iPhone]";
pub const ROUTINES_VERSION: &str = "3.0.255246";
pub const ACCEPT: &str = "application/json; charset=utf-8";
pub const ACCEPT_LANGUAGE: &str = "en-CA,en-CA;q=1.0,ar-CA;q=0.9";

const REDACTED: &str = "<redacted>";

/// Authenticated identity for one run. Built once, never mutated.
#[derive(Clone, PartialEq)]
pub struct Session {
    pub host: String,
    pub cookie: String,
    pub csrf: String,
    pub alexa_app: String,
    pub delete_skill: String,
}

impl Session {
    /// Builds a session, deriving the CSRF token from the cookie.
    pub fn new(
        host: impl Into<String>,
        cookie: impl Into<String>,
        alexa_app: impl Into<String>,
        delete_skill: impl Into<String>,
    ) -> CleanupResult<Self> {
        let cookie = cookie.into();
        let csrf = extract_csrf_from_cookie(&cookie)
            .filter(|c| !c.is_empty())
            .ok_or(CleanupError::CsrfNotFound)?;
        Ok(Self {
            host: host.into(),
            cookie,
            csrf,
            alexa_app: alexa_app.into(),
            delete_skill: delete_skill.into(),
        })
    }

    pub fn base_url(&self) -> String {
        format!("https://{}", self.host)
    }
}

// Sessions end up in error logs; keep the credentials out of them.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.host)
            .field("cookie", &REDACTED)
            .field("csrf", &REDACTED)
            .field("alexa_app", &REDACTED)
            .field("delete_skill", &self.delete_skill)
            .finish()
    }
}

/// Pulls the `csrf` value out of a Cookie header (`a=1; csrf=xyz; b=2`).
pub fn extract_csrf_from_cookie(cookie: &str) -> Option<String> {
    cookie
        .trim()
        .trim_matches(';')
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| name.trim() == "csrf")
        .map(|(_, value)| value.trim().to_string())
}

/// Credential values gathered from flags and environment, before prompting.
#[derive(Debug, Clone, Default)]
pub struct ProvidedConfig {
    pub host: Option<String>,
    pub cookie: Option<String>,
    pub alexa_app: Option<String>,
    pub delete_skill: Option<String>,
}

impl ProvidedConfig {
    pub fn get(&self, field: ConfigField) -> Option<&str> {
        let value = match field {
            ConfigField::Host => &self.host,
            ConfigField::Cookie => &self.cookie,
            ConfigField::AlexaApp => &self.alexa_app,
            ConfigField::DeleteSkill => &self.delete_skill,
        };
        value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn is_complete(&self) -> bool {
        [
            ConfigField::Host,
            ConfigField::Cookie,
            ConfigField::AlexaApp,
            ConfigField::DeleteSkill,
        ]
        .iter()
        .all(|f| self.get(*f).is_some())
    }
}

/// Source of values the operator types in when flags and env came up empty.
pub trait Prompter {
    /// Called once before the first `ask`, only if something is missing.
    fn intro(&mut self) {}

    /// Asks for one field. `None` or empty means the operator gave nothing.
    fn ask(&mut self, field: ConfigField) -> CleanupResult<Option<String>>;

    /// Reports a value that came from flags or env.
    fn provided(&mut self, _field: ConfigField, _value: &str) {}

    /// Called right after the cookie is resolved and its CSRF token found.
    fn csrf_extracted(&mut self, _csrf: &str) {}
}

/// Never prompts. Used with `--non-interactive`.
pub struct NoPrompt;

impl Prompter for NoPrompt {
    fn ask(&mut self, _field: ConfigField) -> CleanupResult<Option<String>> {
        Ok(None)
    }

    fn csrf_extracted(&mut self, csrf: &str) {
        println!("✓ CSRF token automatically extracted from cookie: {}", csrf);
    }
}

/// Resolves the session: flags > environment > prompt > default.
///
/// Flags and environment are already merged into `provided` by clap. HOST
/// falls back to [`DEFAULT_HOST`]; every other field is required.
pub fn resolve_session<P: Prompter>(provided: &ProvidedConfig, prompter: &mut P) -> CleanupResult<Session> {
    if !provided.is_complete() {
        prompter.intro();
    }

    let host = take(provided, prompter, ConfigField::Host)?.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let cookie = take(provided, prompter, ConfigField::Cookie)?
        .ok_or(CleanupError::MissingConfig(ConfigField::Cookie))?;
    let csrf = extract_csrf_from_cookie(&cookie)
        .filter(|c| !c.is_empty())
        .ok_or(CleanupError::CsrfNotFound)?;
    prompter.csrf_extracted(&csrf);
    let alexa_app = take(provided, prompter, ConfigField::AlexaApp)?
        .ok_or(CleanupError::MissingConfig(ConfigField::AlexaApp))?;
    let delete_skill = take(provided, prompter, ConfigField::DeleteSkill)?
        .ok_or(CleanupError::MissingConfig(ConfigField::DeleteSkill))?;

    tracing::debug!(%host, csrf_len = csrf.len(), "session resolved");

    Ok(Session {
        host,
        cookie,
        csrf,
        alexa_app,
        delete_skill,
    })
}

/// A provided value wins; otherwise ask. Blank answers count as missing.
fn take<P: Prompter>(
    provided: &ProvidedConfig,
    prompter: &mut P,
    field: ConfigField,
) -> CleanupResult<Option<String>> {
    if let Some(value) = provided.get(field) {
        prompter.provided(field, value);
        return Ok(Some(value.to_string()));
    }
    Ok(prompter
        .ask(field)?
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty()))
}

/// Knobs for a run that are not credentials.
#[derive(Debug, Clone)]
pub struct Settings {
    pub filter_text: String,
    pub delay: Option<Duration>,
    pub snapshots: bool,
    pub snapshot_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            filter_text: DEFAULT_FILTER_TEXT.to_string(),
            delay: None,
            snapshots: true,
            snapshot_dir: PathBuf::from("."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct Scripted {
        answers: VecDeque<Option<String>>,
        asked: Vec<ConfigField>,
        intro_shown: bool,
        events: Vec<String>,
    }

    impl Scripted {
        fn new(answers: &[Option<&str>]) -> Self {
            Self {
                answers: answers.iter().map(|a| a.map(String::from)).collect(),
                asked: Vec::new(),
                intro_shown: false,
                events: Vec::new(),
            }
        }
    }

    impl Prompter for Scripted {
        fn intro(&mut self) {
            self.intro_shown = true;
        }

        fn ask(&mut self, field: ConfigField) -> CleanupResult<Option<String>> {
            self.asked.push(field);
            self.events.push(format!("ask {}", field));
            Ok(self.answers.pop_front().flatten())
        }

        fn provided(&mut self, field: ConfigField, _value: &str) {
            self.events.push(format!("provided {}", field));
        }

        fn csrf_extracted(&mut self, csrf: &str) {
            self.events.push(format!("csrf {}", csrf));
        }
    }

    fn full() -> ProvidedConfig {
        ProvidedConfig {
            host: Some("eu-api-alexa.amazon.co.uk".into()),
            cookie: Some("session-id=1; csrf=abc123; x=y".into()),
            alexa_app: Some("app".into()),
            delete_skill: Some("SKILL_x".into()),
        }
    }

    #[test]
    fn test_extract_csrf() {
        assert_eq!(extract_csrf_from_cookie("csrf=abc"), Some("abc".into()));
        assert_eq!(
            extract_csrf_from_cookie("  a=1 ;  csrf = tok-en ; b=2;"),
            Some("tok-en".into())
        );
        assert_eq!(
            extract_csrf_from_cookie("a=1; csrf=with=equals"),
            Some("with=equals".into())
        );
        assert_eq!(extract_csrf_from_cookie("a=1; xcsrf=nope; b"), None);
        assert_eq!(extract_csrf_from_cookie(""), None);
    }

    #[test]
    fn test_session_new_requires_csrf() {
        let err = Session::new("h", "a=1", "app", "skill").unwrap_err();
        assert!(matches!(err, CleanupError::CsrfNotFound));

        let session = Session::new("h", "csrf=t", "app", "skill").unwrap();
        assert_eq!(session.csrf, "t");
        assert_eq!(session.base_url(), "https://h");
    }

    #[test]
    fn test_session_new_rejects_empty_csrf() {
        for cookie in ["a=1; csrf=; b=2", "csrf=", "csrf=   "] {
            let err = Session::new("h", cookie, "app", "skill").unwrap_err();
            assert!(matches!(err, CleanupError::CsrfNotFound), "{}", cookie);
        }
    }

    #[test]
    fn test_session_debug_hides_credentials() {
        let session = Session::new("h", "session-id=secret-sid; csrf=secret-tok", "secret-app", "SKILL_x").unwrap();
        let shown = format!("{:?}", session);
        assert!(!shown.contains("secret-sid"));
        assert!(!shown.contains("secret-tok"));
        assert!(!shown.contains("secret-app"));
        assert!(shown.contains("<redacted>"));
        assert!(shown.contains("SKILL_x"));
    }

    #[test]
    fn test_csrf_reported_before_remaining_prompts() {
        let provided = ProvidedConfig {
            alexa_app: None,
            delete_skill: None,
            ..full()
        };
        let mut prompter = Scripted::new(&[Some("app"), Some("SKILL_y")]);
        resolve_session(&provided, &mut prompter).unwrap();
        assert_eq!(
            prompter.events,
            vec![
                "provided HOST",
                "provided COOKIE",
                "csrf abc123",
                "ask X_AMZN_ALEXA_APP",
                "ask DELETE_SKILL",
            ]
        );
    }

    #[test]
    fn test_resolve_uses_provided_without_prompting() {
        let mut prompter = Scripted::new(&[]);
        let session = resolve_session(&full(), &mut prompter).unwrap();
        assert_eq!(session.host, "eu-api-alexa.amazon.co.uk");
        assert_eq!(session.csrf, "abc123");
        assert!(prompter.asked.is_empty());
        assert!(!prompter.intro_shown);
    }

    #[test]
    fn test_resolve_prompts_only_missing_and_defaults_host() {
        let provided = ProvidedConfig {
            host: Some("   ".into()),
            alexa_app: None,
            ..full()
        };
        let mut prompter = Scripted::new(&[Some(""), Some(" typed-app ")]);
        let session = resolve_session(&provided, &mut prompter).unwrap();
        assert_eq!(session.host, DEFAULT_HOST);
        assert_eq!(session.alexa_app, "typed-app");
        assert_eq!(prompter.asked, vec![ConfigField::Host, ConfigField::AlexaApp]);
        assert!(prompter.intro_shown);
    }

    #[test]
    fn test_resolve_without_prompt_reports_missing() {
        let provided = ProvidedConfig {
            delete_skill: None,
            ..full()
        };
        let err = resolve_session(&provided, &mut NoPrompt).unwrap_err();
        assert!(matches!(err, CleanupError::MissingConfig(ConfigField::DeleteSkill)));
    }

    #[test]
    fn test_resolve_rejects_cookie_without_csrf() {
        let provided = ProvidedConfig {
            cookie: Some("session-id=1".into()),
            ..full()
        };
        let err = resolve_session(&provided, &mut NoPrompt).unwrap_err();
        assert!(matches!(err, CleanupError::CsrfNotFound));
    }
}
