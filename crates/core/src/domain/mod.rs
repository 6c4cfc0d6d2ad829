pub mod price;
pub mod score;
