//! Injected ambient dependencies: wall clock and id generation.
//!
//! State machines and the evaluator never call `now()` or mint ids on
//! their own; both come in from the outside so evaluation stays a
//! deterministic function of explicit inputs.

pub trait Clock: Send + Sync {
    /// Current instant as Unix-epoch seconds.
    fn now(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

pub trait IdGen: Send + Sync {
    fn new_id(&self) -> String;
}

pub struct UuidGen;

impl IdGen for UuidGen {
    fn new_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}
