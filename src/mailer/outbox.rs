/// Outbound email queue
///
/// Flows enqueue a job and return; a dedicated worker task drains the
/// channel and talks to SMTP. The HTTP response never waits on delivery,
/// and a failed send is logged as a dead letter instead of disappearing.
use super::Mailer;
use tokio::sync::mpsc;

/// One queued outbound email
#[derive(Debug, Clone)]
pub enum EmailJob {
    Confirmation {
        to: String,
        name: String,
        otp: String,
        confirm_link: String,
    },
    PasswordReset {
        to: String,
        name: String,
        otp: String,
    },
}

impl EmailJob {
    fn describe(&self) -> String {
        match self {
            EmailJob::Confirmation { to, .. } => format!("confirmation email to {}", to),
            EmailJob::PasswordReset { to, .. } => format!("password reset email to {}", to),
        }
    }
}

/// Cloneable handle used by flows to enqueue jobs
#[derive(Clone)]
pub struct EmailOutbox {
    tx: mpsc::UnboundedSender<EmailJob>,
}

impl EmailOutbox {
    /// Create the outbox and spawn its worker task
    pub fn start(mailer: Mailer) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(mailer, rx));
        Self { tx }
    }

    /// Create an outbox whose jobs are never delivered. Used in tests.
    #[cfg(test)]
    pub fn disconnected() -> (Self, mpsc::UnboundedReceiver<EmailJob>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueue a job; never blocks the request path
    pub fn enqueue(&self, job: EmailJob) {
        if self.tx.send(job).is_err() {
            // Worker gone; nothing to do but surface it in the logs
            tracing::error!("email outbox worker is down, dropping job");
        }
    }
}

async fn run_worker(mailer: Mailer, mut rx: mpsc::UnboundedReceiver<EmailJob>) {
    while let Some(job) = rx.recv().await {
        let description = job.describe();

        let result = match &job {
            EmailJob::Confirmation {
                to,
                name,
                otp,
                confirm_link,
            } => mailer.send_confirmation_email(to, name, otp, confirm_link).await,
            EmailJob::PasswordReset { to, name, otp } => {
                mailer.send_password_reset_email(to, name, otp).await
            }
        };

        if let Err(e) = result {
            // Dead letter: the request already succeeded, so this is the
            // only trace the failure leaves
            tracing::error!("dead letter: {} failed: {}", description, e);
        }
    }

    tracing::info!("email outbox worker stopped");
}
