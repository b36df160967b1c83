use std::fmt;

/// Mailbox identity plus app password, carried from the sync request to the
/// fetch call. The password never appears in logs or `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct MailboxCredentials {
    username: String,
    app_password: String,
}

impl MailboxCredentials {
    pub fn new(username: impl Into<String>, app_password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            app_password: app_password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn app_password(&self) -> &str {
        &self.app_password
    }
}

impl fmt::Debug for MailboxCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailboxCredentials")
            .field("username", &self.username)
            .field("app_password", &"[REDACTED]")
            .finish()
    }
}
