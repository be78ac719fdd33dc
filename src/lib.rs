//! Admin list views for employees and tasks: fetch a whole listing from the
//! backend once, then filter, sort and page it locally.

pub mod config;

pub mod domain {
    pub mod entities {
        pub mod employee;
        pub mod query;
        pub mod record;
        pub mod task;
        pub mod view;
    }
}

pub mod usecase {
    pub mod error;

    pub mod ports {
        #[cfg(test)]
        pub mod mock_remote;
        pub mod remote;
    }

    pub mod services {
        pub mod aggregator;
        pub mod edit_service;
        pub mod mutation_coordinator;
        pub mod query_service;
        pub mod request_token;
        pub mod view_pipeline;
    }
}

pub mod infra {
    pub mod export {
        pub mod csv;
    }

    pub mod import {
        pub mod csv;
    }

    pub mod sqlite {
        pub mod queries;
        pub mod repo;
        pub mod schema;
        pub mod validate;
    }
}

pub mod platform {
    pub mod debounce;
}

pub mod ui {
    pub mod state {
        pub mod list_controller;
    }
}
