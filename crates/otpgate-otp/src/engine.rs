//! OTP issuance and verification engine.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use rand::Rng;
use tracing::{debug, info, warn};

use otpgate_core::{Button, OutboundPayload, SendOptions, TransportHandle, jid};

use crate::error::{OtpError, OtpResult};
use crate::phone::DialPlan;
use crate::ratelimit::RateLimiter;
use crate::store::{OtpRecord, OtpStats, OtpStore, StoreDisposition};

/// Tunable lifecycle parameters.
#[derive(Debug, Clone)]
pub struct OtpPolicy {
    /// Code validity window.
    pub ttl: Duration,
    /// Wrong submissions allowed before a code is locked out.
    pub max_attempts: u32,
    /// Whether resend requests bypass the rate limiter.
    pub resend_exempt_from_limit: bool,
    /// Rate-limit window.
    pub rate_window: Duration,
    /// Requests admitted per window per number.
    pub rate_max_requests: usize,
    /// Country-code completion rules.
    pub dial_plan: DialPlan,
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(600),
            max_attempts: 5,
            resend_exempt_from_limit: true,
            rate_window: Duration::from_secs(60),
            rate_max_requests: 5,
            dial_plan: DialPlan::default(),
        }
    }
}

/// Whether an issuance is a first send or a resend.
///
/// Resends use a different message text, omit the resend button, and may
/// bypass the rate limiter depending on policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    Initial,
    Resend,
}

/// Outcome of a successful issuance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueReceipt {
    /// Canonical number the code was sent to.
    pub phone_number: String,
    /// Validity window of the issued code.
    pub expires_in: Duration,
}

/// Outcome of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReceipt {
    /// Canonical number the code belonged to.
    pub phone_number: String,
}

/// The OTP lifecycle engine.
///
/// Stateless between calls apart from the store and the limiter; safe to
/// share behind an `Arc` across the HTTP surface and message handlers.
pub struct OtpEngine {
    store: Arc<dyn OtpStore>,
    limiter: RateLimiter,
    policy: OtpPolicy,
}

impl OtpEngine {
    /// Creates an engine over a store with the given policy.
    pub fn new(store: Arc<dyn OtpStore>, policy: OtpPolicy) -> Self {
        let limiter = RateLimiter::new(policy.rate_window, policy.rate_max_requests);
        Self {
            store,
            limiter,
            policy,
        }
    }

    /// The lifecycle policy.
    pub fn policy(&self) -> &OtpPolicy {
        &self.policy
    }

    /// Issues a code to a number and delivers it over the transport.
    ///
    /// The record is keyed by the canonical number and replaces any earlier
    /// code for it. A delivery failure rolls the rate-limit admission back
    /// so the caller can retry without burning window budget.
    pub async fn issue(
        &self,
        raw_number: &str,
        kind: IssueKind,
        handle: &dyn TransportHandle,
    ) -> OtpResult<IssueReceipt> {
        let phone = self.policy.dial_plan.canonicalize(raw_number)?;

        let exempt = kind == IssueKind::Resend && self.policy.resend_exempt_from_limit;
        let admitted = if exempt {
            debug!(phone = %phone, "Resend exempt from rate limit");
            false
        } else if self.limiter.admit(&phone) {
            true
        } else {
            warn!(phone = %phone, "OTP request rate limited");
            return Err(OtpError::RateLimited {
                phone_number: phone,
            });
        };

        let code = generate_code();
        let now = SystemTime::now();
        self.store.upsert(OtpRecord::issue(
            phone.clone(),
            code.clone(),
            now,
            self.policy.ttl,
        ));

        let payload = self.delivery_payload(&code, &phone, kind);
        let recipient = jid::user_jid(&phone);
        if let Err(e) = handle.send(&recipient, payload, SendOptions::default()).await {
            if admitted {
                self.limiter.forgive(&phone);
            }
            warn!(phone = %phone, error = %e, "OTP delivery failed");
            return Err(e.into());
        }

        info!(phone = %phone, kind = ?kind, "OTP sent");
        Ok(IssueReceipt {
            phone_number: phone,
            expires_in: self.policy.ttl,
        })
    }

    /// Verifies a submitted code.
    ///
    /// The whole check-and-mutate sequence runs inside one store-level
    /// update, so two concurrent submissions of the same code cannot both
    /// succeed.
    pub fn verify(&self, raw_number: &str, code: &str) -> OtpResult<VerifyReceipt> {
        let phone = self.policy.dial_plan.canonicalize(raw_number)?;
        let submitted = code.trim();
        let now = SystemTime::now();
        let max_attempts = self.policy.max_attempts;

        let mut outcome: OtpResult<()> = Err(OtpError::NotFound);
        self.store.update(&phone, &mut |slot| {
            let Some(record) = slot else {
                outcome = Err(OtpError::NotFound);
                return StoreDisposition::Retain;
            };
            if record.verified {
                outcome = Err(OtpError::NotFound);
                return StoreDisposition::Retain;
            }
            if now > record.expires_at {
                outcome = Err(OtpError::Expired);
                return StoreDisposition::Remove;
            }
            if record.attempts >= max_attempts {
                outcome = Err(OtpError::TooManyAttempts);
                return StoreDisposition::Retain;
            }
            if record.code != submitted {
                record.attempts += 1;
                outcome = Err(OtpError::Mismatch);
                return StoreDisposition::Retain;
            }
            record.verified = true;
            record.verified_at = Some(now);
            outcome = Ok(());
            StoreDisposition::Retain
        });

        match outcome {
            Ok(()) => {
                info!(phone = %phone, "OTP verified");
                Ok(VerifyReceipt {
                    phone_number: phone,
                })
            }
            Err(e) => {
                debug!(phone = %phone, error = %e, "OTP verification refused");
                Err(e)
            }
        }
    }

    /// Aggregate counters over the store.
    pub fn stats(&self) -> OtpStats {
        self.store.stats(SystemTime::now())
    }

    fn delivery_payload(&self, code: &str, phone: &str, kind: IssueKind) -> OutboundPayload {
        let minutes = self.policy.ttl.as_secs() / 60;
        match kind {
            IssueKind::Initial => OutboundPayload::Interactive {
                text: format!(
                    "*`🔐 VERIFICATION CODE`*\n\n```Your OTP is:\n\n*{code}*```\n\n\
                     This code will expire in {minutes} minutes.\n\n\
                     ⚠️ Do not share this code with anyone."
                ),
                footer: "OTP Verification System".to_string(),
                buttons: vec![
                    Button {
                        id: format!("copy_{code}"),
                        label: "📋 Copy Code".to_string(),
                    },
                    Button {
                        id: format!("resend_{phone}"),
                        label: "🔄 Resend Code".to_string(),
                    },
                ],
            },
            IssueKind::Resend => OutboundPayload::Interactive {
                text: format!(
                    "*`🔄 NEW VERIFICATION CODE`*\n\n```Your new OTP is:\n\n*{code}*```\n\n\
                     This code will expire in {minutes} minutes.\n\n\
                     ⚠️ Do not share this code with anyone."
                ),
                footer: "OTP Verification System".to_string(),
                buttons: vec![Button {
                    id: format!("copy_{code}"),
                    label: "📋 Copy Code".to_string(),
                }],
            },
        }
    }
}

/// Uniformly random six-digit code.
fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use otpgate_core::{
        DeliveryAck, GroupMetadata, MessageKey, TransportError, TransportResult,
    };

    use crate::store::MemoryOtpStore;

    struct StubHandle {
        sends: Mutex<Vec<(String, OutboundPayload)>>,
        fail: bool,
    }

    impl StubHandle {
        fn new() -> Self {
            Self {
                sends: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                sends: Mutex::new(Vec::new()),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl TransportHandle for StubHandle {
        fn identity(&self) -> String {
            "263719000000@s.whatsapp.net".to_string()
        }

        async fn send(
            &self,
            conversation_id: &str,
            payload: OutboundPayload,
            _options: SendOptions,
        ) -> TransportResult<DeliveryAck> {
            if self.fail {
                return Err(TransportError::SendFailed("stub".into()));
            }
            self.sends
                .lock()
                .push((conversation_id.to_string(), payload));
            Ok(DeliveryAck {
                message_id: "SENT".into(),
            })
        }

        async fn relay(
            &self,
            _conversation_id: &str,
            _raw: serde_json::Value,
        ) -> TransportResult<()> {
            Ok(())
        }

        async fn read_messages(&self, _keys: &[MessageKey]) -> TransportResult<()> {
            Ok(())
        }

        async fn group_metadata(&self, _conversation_id: &str) -> TransportResult<GroupMetadata> {
            Ok(GroupMetadata::default())
        }

        async fn disconnect(&self) {}
    }

    fn engine() -> (OtpEngine, Arc<MemoryOtpStore>) {
        let store = Arc::new(MemoryOtpStore::new());
        let engine = OtpEngine::new(Arc::clone(&store) as Arc<dyn OtpStore>, OtpPolicy::default());
        (engine, store)
    }

    #[tokio::test]
    async fn test_issue_stores_record_and_sends_buttons() {
        let (engine, store) = engine();
        let handle = StubHandle::new();

        let receipt = engine
            .issue("719647303", IssueKind::Initial, &handle)
            .await
            .unwrap();
        assert_eq!(receipt.phone_number, "263719647303");
        assert_eq!(receipt.expires_in, Duration::from_secs(600));

        let record = store.find("263719647303").unwrap();
        assert_eq!(record.code.len(), 6);
        assert!(!record.verified);

        let sends = handle.sends.lock();
        assert_eq!(sends.len(), 1);
        assert_eq!(sends[0].0, "263719647303@s.whatsapp.net");
        match &sends[0].1 {
            OutboundPayload::Interactive { text, buttons, .. } => {
                assert!(text.contains(&record.code));
                assert_eq!(buttons.len(), 2);
                assert_eq!(buttons[0].id, format!("copy_{}", record.code));
                assert_eq!(buttons[1].id, "resend_263719647303");
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_sixth_request_in_window_rate_limited() {
        let (engine, _) = engine();
        let handle = StubHandle::new();

        for _ in 0..5 {
            engine
                .issue("719647303", IssueKind::Initial, &handle)
                .await
                .unwrap();
        }
        let err = engine
            .issue("719647303", IssueKind::Initial, &handle)
            .await
            .unwrap_err();
        assert!(matches!(err, OtpError::RateLimited { phone_number } if phone_number == "263719647303"));
    }

    #[tokio::test]
    async fn test_resend_bypasses_rate_limit() {
        let (engine, _) = engine();
        let handle = StubHandle::new();

        for _ in 0..5 {
            engine
                .issue("719647303", IssueKind::Initial, &handle)
                .await
                .unwrap();
        }
        // Window exhausted, resend still goes through.
        let receipt = engine
            .issue("719647303", IssueKind::Resend, &handle)
            .await
            .unwrap();
        assert_eq!(receipt.phone_number, "263719647303");

        match &handle.sends.lock().last().unwrap().1 {
            OutboundPayload::Interactive { buttons, .. } => assert_eq!(buttons.len(), 1),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delivery_failure_rolls_back_admission() {
        let (engine, _) = engine();
        let failing = StubHandle::failing();

        let err = engine
            .issue("719647303", IssueKind::Initial, &failing)
            .await
            .unwrap_err();
        assert!(matches!(err, OtpError::Transport(_)));

        // The failed attempt must not have consumed window budget.
        let handle = StubHandle::new();
        for _ in 0..5 {
            engine
                .issue("719647303", IssueKind::Initial, &handle)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_verify_happy_path_then_not_found() {
        let (engine, store) = engine();
        let handle = StubHandle::new();
        engine
            .issue("719647303", IssueKind::Initial, &handle)
            .await
            .unwrap();
        let code = store.find("263719647303").unwrap().code;

        let receipt = engine.verify("719647303", &code).unwrap();
        assert_eq!(receipt.phone_number, "263719647303");
        assert!(store.find("263719647303").unwrap().verified);

        // A verified code cannot be replayed.
        let err = engine.verify("719647303", &code).unwrap_err();
        assert!(matches!(err, OtpError::NotFound));
    }

    #[tokio::test]
    async fn test_wrong_code_increments_attempts_until_lockout() {
        let (engine, store) = engine();
        let handle = StubHandle::new();
        engine
            .issue("719647303", IssueKind::Initial, &handle)
            .await
            .unwrap();
        let code = store.find("263719647303").unwrap().code;

        for i in 1..=5 {
            let err = engine.verify("719647303", "000000").unwrap_err();
            assert!(matches!(err, OtpError::Mismatch));
            assert_eq!(store.find("263719647303").unwrap().attempts, i);
        }

        // Budget exhausted, even the right code is refused.
        let err = engine.verify("719647303", &code).unwrap_err();
        assert!(matches!(err, OtpError::TooManyAttempts));
    }

    #[test]
    fn test_expired_code_refused_and_deleted() {
        let (engine, store) = engine();
        let past = SystemTime::now() - Duration::from_secs(700);
        store.upsert(OtpRecord::issue(
            "263719647303".into(),
            "123456".into(),
            past,
            Duration::from_secs(600),
        ));

        let err = engine.verify("263719647303", "123456").unwrap_err();
        assert!(matches!(err, OtpError::Expired));
        assert!(store.find("263719647303").is_none());

        let err = engine.verify("263719647303", "123456").unwrap_err();
        assert!(matches!(err, OtpError::NotFound));
    }

    #[tokio::test]
    async fn test_stats_reflect_lifecycle() {
        let (engine, store) = engine();
        let handle = StubHandle::new();
        engine
            .issue("719647303", IssueKind::Initial, &handle)
            .await
            .unwrap();
        engine
            .issue("14155550100", IssueKind::Initial, &handle)
            .await
            .unwrap();
        let code = store.find("263719647303").unwrap().code;
        engine.verify("719647303", &code).unwrap();

        let stats = engine.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.verified, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.last_24_hours, 2);
    }
}
