//! Build-outcome notification contract. Composing the message is this
//! crate's job; actually delivering mail is the caller's.

use serde::Deserialize;
use tracing::info;

use crate::state::{FailureReason, State};

/// SMTP delivery settings. Address templates may contain `{}`, replaced
/// with the username. All fields optional: missing `smtp`, `from_addr`
/// or `to_addr` disables notification entirely.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub smtp: Option<String>,
    #[serde(default)]
    pub from_addr: Option<String>,
    #[serde(default)]
    pub to_addr: Option<String>,
    /// Copied on failure notifications.
    #[serde(default)]
    pub admin_addr: Option<String>,
    #[serde(default)]
    pub local_hostname: Option<String>,
}

impl EmailConfig {
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.smtp.is_some() && self.from_addr.is_some() && self.to_addr.is_some()
    }

    /// Expand an address template for a user.
    #[must_use]
    pub fn expand(template: &str, username: &str) -> String {
        template.replace("{}", username)
    }
}

pub trait Notifier: Send + Sync {
    /// Send `message` to the user, copying the admin address when
    /// `notify_admin` is set. Must not fail the calling operation.
    fn send(
        &self,
        config: &EmailConfig,
        message: &str,
        subject: &str,
        username: &str,
        notify_admin: bool,
    );
}

/// Default notifier: records the notification in the log. Deployments
/// wanting real mail plug in their own [`Notifier`].
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(
        &self,
        config: &EmailConfig,
        message: &str,
        subject: &str,
        username: &str,
        notify_admin: bool,
    ) {
        if !config.is_enabled() {
            return;
        }
        let to = EmailConfig::expand(config.to_addr.as_deref().unwrap_or_default(), username);
        info!(%to, subject, notify_admin, message, "build notification");
    }
}

/// Compose the subject and body for a build-outcome notification.
#[must_use]
pub fn build_outcome_message(
    username: &str,
    env_path: &str,
    state: State,
    failure_reason: Option<FailureReason>,
) -> (String, String) {
    let (subject, verdict, advice) = match state {
        State::Ready => ("Your environment is ready!", "built successfully", ""),
        _ => (
            "Your environment failed to build",
            "failed to build",
            match failure_reason {
                Some(FailureReason::Concretization) => {
                    "\nThe error was a version conflict. \
                     Try relaxing which versions you've specified.\n"
                }
                _ => "\nThe error was a build error. Contact your grove administrator.\n",
            },
        ),
    };
    let body = format!(
        "Hi {username},\n\nYour environment, {env_path}, has {verdict}.\n{advice}\nGrove Team"
    );
    (subject.to_string(), body)
}
