pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod state;
pub mod views;

pub mod crypto {
    pub mod password;
}

pub mod models {
    pub mod post;
    pub mod session;
    pub mod user;
}

pub mod repositories {
    pub mod memory;
    pub mod post;
    pub mod session;
    pub mod user;
}

pub mod services {
    pub mod auth;
    pub mod posts;
    pub mod uploads;
}

pub mod handlers {
    pub mod auth;
    pub mod posts;
}

pub mod middleware_layer {
    pub mod auth;
    pub mod rate_limit;
}

pub mod validation {
    pub mod auth;
    pub mod post;
}
