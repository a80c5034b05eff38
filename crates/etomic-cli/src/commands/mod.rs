pub mod deal;
pub mod keygen;
pub mod ledger;
pub mod leg;
pub mod payment;
pub mod relay_deal;
pub mod secret;
pub mod status;
