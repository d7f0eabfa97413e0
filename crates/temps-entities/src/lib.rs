pub mod project_dsns;
