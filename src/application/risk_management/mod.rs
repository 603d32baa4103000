// Risk management and position control modules (§4.8, §4.9, §4.12)
pub mod correlation;
pub mod position_sizer;
pub mod protection;
pub mod sl_enforcer;
