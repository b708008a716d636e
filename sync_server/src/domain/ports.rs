// Port for retrieving the current time used to stamp outbound messages.
pub trait Clock: Send + Sync {
    fn now_epoch_millis(&self) -> u64;
}
