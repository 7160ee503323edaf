// master/src/state.rs

use common::status::RunBoard;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// Estado de la corrida en curso; lo escribe el orquestador.
    pub board: Arc<RunBoard>,
}

impl AppState {
    pub fn new(board: Arc<RunBoard>) -> Self {
        Self { board }
    }
}
