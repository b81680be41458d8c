// libs/appointment-cell/src/services/notification.rs
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::info;

use crate::models::{AppointmentError, NotificationIntent};

/// Hand-off point to whatever delivers notifications. Delivery itself is
/// outside this crate.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish(&self, intent: NotificationIntent) -> Result<(), AppointmentError>;
}

/// Records intents in the log.
#[derive(Debug, Default)]
pub struct TracingNotificationSink;

#[async_trait]
impl NotificationSink for TracingNotificationSink {
    async fn publish(&self, intent: NotificationIntent) -> Result<(), AppointmentError> {
        info!(
            appointment_id = %intent.appointment_id,
            staff_id = %intent.staff_id,
            patient_id = %intent.patient_id,
            waited_minutes = intent.waited_minutes,
            "Notification intent: {:?}",
            intent.kind
        );
        Ok(())
    }
}

/// Forwards intents to an in-process consumer.
pub struct ChannelNotificationSink {
    sender: mpsc::Sender<NotificationIntent>,
}

impl ChannelNotificationSink {
    pub fn new(sender: mpsc::Sender<NotificationIntent>) -> Self {
        Self { sender }
    }

    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<NotificationIntent>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        (Self::new(sender), receiver)
    }
}

#[async_trait]
impl NotificationSink for ChannelNotificationSink {
    async fn publish(&self, intent: NotificationIntent) -> Result<(), AppointmentError> {
        self.sender
            .send(intent)
            .await
            .map_err(|_| AppointmentError::Dependency("notification consumer has gone away".to_string()))
    }
}
