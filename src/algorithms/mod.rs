mod pss;

pub use self::pss::*;
