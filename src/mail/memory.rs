use super::{MailError, Mailer, OutboundEmail};
use std::collections::HashSet;
use std::sync::Mutex;

/// In-memory [`Mailer`] for tests.
///
/// Records every delivered mail and rejects recipients registered through
/// [`MemoryMailer::fail_for`], so relay failures can be simulated without a
/// network.
#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<OutboundEmail>>,
    failing: Mutex<HashSet<String>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every future send to `address` fail.
    pub fn fail_for(&self, address: &str) {
        self.failing
            .lock()
            .expect("failing set poisoned")
            .insert(address.to_string());
    }

    /// Snapshot of everything delivered so far.
    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().expect("sent log poisoned").clone()
    }
}

#[rocket::async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, mail: &OutboundEmail) -> Result<(), MailError> {
        let failing = self.failing.lock().expect("failing set poisoned");
        if failing.contains(&mail.to) {
            return Err(MailError::Rejected(format!(
                "simulated relay failure for {}",
                mail.to
            )));
        }
        drop(failing);

        self.sent.lock().expect("sent log poisoned").push(mail.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_sends_and_simulates_failures() {
        let mailer = MemoryMailer::new();
        mailer.fail_for("bounce@example.com");

        let ok = OutboundEmail {
            to: "ada@example.com".to_string(),
            subject: "hi".to_string(),
            body: "hello".to_string(),
        };
        mailer.send(&ok).await.expect("delivery succeeds");

        let bounced = OutboundEmail {
            to: "bounce@example.com".to_string(),
            ..ok.clone()
        };
        assert!(mailer.send(&bounced).await.is_err());

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "ada@example.com");
    }
}
