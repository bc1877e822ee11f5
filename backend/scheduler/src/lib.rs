pub mod activity;
pub mod campaign;
pub mod clock;
pub mod delay;
pub mod prompt;
pub mod registry;
pub mod scanner;
pub mod service;
pub mod supervisor;

#[cfg(test)]
mod testing;

pub use activity::{ActivityRecord, ActivityStore};
pub use campaign::{CampaignContext, CampaignOutcome, CampaignState, ReminderCampaign};
pub use clock::{Clock, ManualClock, SystemClock};
pub use delay::ResponseDelay;
pub use registry::MonitorRegistry;
pub use scanner::{InactivityScanner, ScanReport};
pub use service::{OutreachScheduler, OutreachSchedulerBuilder};
pub use supervisor::{Admission, CampaignReport, CampaignSupervisor};
