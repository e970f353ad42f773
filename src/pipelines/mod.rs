pub mod demand;
pub mod gavi;
pub mod mi4a;
pub mod who_supply;
