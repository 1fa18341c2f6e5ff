mod freebusy;

pub use freebusy::FreeBusyNotifier;
