use std::sync::Arc;

use crate::application::tasks::TaskService;

#[derive(Clone)]
pub struct HttpState {
    pub tasks: Arc<TaskService>,
}

impl HttpState {
    pub fn new(tasks: Arc<TaskService>) -> Self {
        Self { tasks }
    }
}
