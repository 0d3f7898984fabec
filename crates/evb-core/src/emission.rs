//! Emission pipeline: sends a batch item by item and hands every sent message
//! over to the deletion scheduler.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::{
    catalog::{Batch, CaptionTemplate},
    clock::Clock,
    deletion::{DeletionScheduler, DeletionTask, RegisterOutcome},
    domain::ChatId,
    messaging::port::MessagingPort,
    Result,
};

/// Counts for one emitted batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EmitReport {
    pub sent: usize,
    pub failed: usize,
    /// Placeholder items passed over inside a partly configured batch.
    pub skipped: usize,
    pub scheduled: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmitOutcome {
    /// Empty or placeholder-only batch: the "not available" notice was sent.
    Unavailable,
    Emitted(EmitReport),
}

pub struct Emitter {
    messenger: Arc<dyn MessagingPort>,
    scheduler: Arc<DeletionScheduler>,
    clock: Arc<dyn Clock>,
    retention: chrono::Duration,
    caption: CaptionTemplate,
}

impl Emitter {
    pub fn new(
        messenger: Arc<dyn MessagingPort>,
        scheduler: Arc<DeletionScheduler>,
        clock: Arc<dyn Clock>,
        retention: chrono::Duration,
        caption: CaptionTemplate,
    ) -> Self {
        Self {
            messenger,
            scheduler,
            clock,
            retention,
            caption,
        }
    }

    /// Send `batch` to `chat_id` in catalog order.
    ///
    /// Only the notice/intro send can fail the whole call; per-item send and
    /// registration failures are logged and counted.
    pub async fn emit(&self, chat_id: ChatId, batch: &Batch) -> Result<EmitOutcome> {
        if batch.is_unconfigured() {
            warn!(%chat_id, batch = %batch.name, "no configured items for batch");
            self.messenger
                .send_text(
                    chat_id,
                    &format!("Sorry, no videos are available for {} yet.", batch.name),
                )
                .await?;
            return Ok(EmitOutcome::Unavailable);
        }

        self.messenger
            .send_text(chat_id, &format!("Sending {}...", batch.name))
            .await?;

        let mut report = EmitReport::default();
        for (index, item) in (batch.start_label..=u32::MAX).zip(batch.items.iter()) {
            if item.is_placeholder() {
                warn!(%chat_id, batch = %batch.name, index, "skipping unconfigured item");
                report.skipped += 1;
                continue;
            }

            let caption = self.caption.render(index);
            let sent = match self.messenger.send_media(chat_id, item, &caption).await {
                Ok(msg) => msg,
                Err(e) => {
                    error!(%chat_id, batch = %batch.name, index, "failed to send item: {e}");
                    report.failed += 1;
                    continue;
                }
            };
            report.sent += 1;

            let task = DeletionTask::new(sent, self.clock.now() + self.retention);
            match self.scheduler.register(task).await {
                Ok(RegisterOutcome::Scheduled) => report.scheduled += 1,
                Ok(RegisterOutcome::Duplicate) => {
                    debug!(%chat_id, message_id = %sent.message_id, "deletion already pending");
                }
                Err(e) => {
                    error!(
                        %chat_id,
                        message_id = %sent.message_id,
                        "failed to schedule deletion: {e}"
                    );
                }
            }
        }

        info!(
            %chat_id,
            batch = %batch.name,
            sent = report.sent,
            failed = report.failed,
            skipped = report.skipped,
            scheduled = report.scheduled,
            "batch emitted"
        );
        Ok(EmitOutcome::Emitted(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::{MediaRef, RangeEnd},
        clock::ManualClock,
        deletion::{InMemoryStore, SchedulerConfig, TaskStore},
        errors::TransportErrorKind,
        mocks::{RecordingMessenger, Sent},
    };
    use chrono::{TimeZone, Utc};

    struct Fixture {
        store: Arc<InMemoryStore>,
        messenger: Arc<RecordingMessenger>,
        clock: Arc<ManualClock>,
        emitter: Emitter,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let messenger = Arc::new(RecordingMessenger::default());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap(),
        ));
        let scheduler = DeletionScheduler::new(
            store.clone(),
            messenger.clone(),
            clock.clone(),
            SchedulerConfig::default(),
        );
        let emitter = Emitter::new(
            messenger.clone(),
            scheduler,
            clock.clone(),
            chrono::Duration::seconds(86_400),
            CaptionTemplate::new("Episode {index}").unwrap(),
        );
        Fixture {
            store,
            messenger,
            clock,
            emitter,
        }
    }

    fn batch(start: u32, items: &[&str]) -> Batch {
        Batch {
            name: format!("Episodes {start}-{}", start + 99),
            start_label: start,
            end: RangeEnd::Label(start + 99),
            items: items.iter().map(|s| MediaRef(s.to_string())).collect(),
        }
    }

    #[tokio::test]
    async fn sends_items_in_order_and_schedules_each() {
        let f = fixture();
        let chat = ChatId(42);
        let out = f
            .emitter
            .emit(chat, &batch(101, &["vid-a", "vid-b"]))
            .await
            .unwrap();

        assert_eq!(
            out,
            EmitOutcome::Emitted(EmitReport {
                sent: 2,
                failed: 0,
                skipped: 0,
                scheduled: 2,
            })
        );
        assert_eq!(f.messenger.texts(chat), vec!["Sending Episodes 101-200..."]);

        let media = f.messenger.media(chat);
        let captions: Vec<&str> = media.iter().map(|(_, c, _)| c.as_str()).collect();
        assert_eq!(captions, vec!["Episode 101", "Episode 102"]);
        assert_eq!(media[0].0, "vid-a");
        assert_eq!(media[1].0, "vid-b");

        let expected_fire_at = f.clock.now() + chrono::Duration::seconds(86_400);
        let tasks = f.store.list().await.unwrap();
        assert_eq!(tasks.len(), 2);
        for (task, (_, _, msg)) in tasks.iter().zip(media.iter()) {
            assert_eq!(task.message(), *msg);
            assert_eq!(task.fire_at, expected_fire_at);
        }
    }

    #[tokio::test]
    async fn empty_batch_sends_notice_only() {
        let f = fixture();
        let chat = ChatId(1);
        let out = f.emitter.emit(chat, &batch(1, &[])).await.unwrap();

        assert_eq!(out, EmitOutcome::Unavailable);
        assert_eq!(
            f.messenger.texts(chat),
            vec!["Sorry, no videos are available for Episodes 1-100 yet."]
        );
        assert!(f.messenger.media(chat).is_empty());
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn placeholder_batch_is_unavailable() {
        let f = fixture();
        let chat = ChatId(1);
        let out = f
            .emitter
            .emit(chat, &batch(301, &["Your_Video_ID", "YOUR_VIDEO_ID_HERE"]))
            .await
            .unwrap();

        assert_eq!(out, EmitOutcome::Unavailable);
        assert!(f
            .messenger
            .sent()
            .iter()
            .all(|s| matches!(s, Sent::Text { .. })));
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn failed_item_does_not_stop_the_rest() {
        let f = fixture();
        f.messenger.fail_media("vid-b", TransportErrorKind::Rejected);
        let chat = ChatId(7);

        let out = f
            .emitter
            .emit(chat, &batch(1, &["vid-a", "vid-b", "vid-c"]))
            .await
            .unwrap();

        assert_eq!(
            out,
            EmitOutcome::Emitted(EmitReport {
                sent: 2,
                failed: 1,
                skipped: 0,
                scheduled: 2,
            })
        );
        let captions: Vec<String> = f
            .messenger
            .media(chat)
            .into_iter()
            .map(|(_, c, _)| c)
            .collect();
        assert_eq!(captions, vec!["Episode 1", "Episode 3"]);
        assert_eq!(f.store.len(), 2);
    }

    #[tokio::test]
    async fn placeholder_inside_batch_is_skipped_but_counted() {
        let f = fixture();
        let chat = ChatId(7);

        let out = f
            .emitter
            .emit(chat, &batch(1, &["vid-a", "Your_Video_ID", "vid-c"]))
            .await
            .unwrap();

        let EmitOutcome::Emitted(report) = out else {
            panic!("expected emission, got {out:?}");
        };
        assert_eq!(report.skipped, 1);
        assert_eq!(report.sent, 2);
        let captions: Vec<String> = f
            .messenger
            .media(chat)
            .into_iter()
            .map(|(_, c, _)| c)
            .collect();
        assert_eq!(captions, vec!["Episode 1", "Episode 3"]);
    }

    #[tokio::test]
    async fn batch_ending_at_the_last_label_emits() {
        let f = fixture();
        let chat = ChatId(3);
        let last = Batch {
            name: format!("Episodes {}-Ongoing", u32::MAX),
            start_label: u32::MAX,
            end: RangeEnd::Ongoing,
            items: vec![MediaRef("vid-z".into())],
        };

        let out = f.emitter.emit(chat, &last).await.unwrap();

        assert!(matches!(out, EmitOutcome::Emitted(r) if r.sent == 1));
        let captions: Vec<String> = f
            .messenger
            .media(chat)
            .into_iter()
            .map(|(_, c, _)| c)
            .collect();
        assert_eq!(captions, vec![format!("Episode {}", u32::MAX)]);
    }
}
