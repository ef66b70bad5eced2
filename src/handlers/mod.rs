pub mod health;
pub mod login;
pub mod password;
pub mod two_factor;

pub use health::health_check;
pub use login::login;
pub use password::issue_password;
pub use two_factor::issue_second_factor;
