pub mod common;
pub mod connection;
pub mod dag;
pub mod dag_run;
pub mod filter;
pub mod pool;
pub mod provider;
pub mod task_instance;
pub mod task_log;
pub mod update;
pub mod validation;
pub mod variable;
pub mod xcom;

pub use common::*;
pub use connection::*;
pub use dag::*;
pub use dag_run::*;
pub use filter::*;
pub use pool::*;
pub use provider::*;
pub use task_instance::*;
pub use task_log::*;
pub use update::*;
pub use validation::*;
pub use variable::*;
pub use xcom::*;
