use serde::{Deserialize, Serialize};

/// Endpoint especial: el comando corre en la máquina del orquestador.
pub const LOCAL_ENDPOINT: &str = "local";

/// Una conexión del pool de workers remotos.
///
/// Ejecuta un solo comando a la vez (capacidad 1); el orquestador serializa
/// las tareas asignadas a la misma conexión.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerConnection {
    pub index: usize,
    /// Nombre lógico, ej: "ssh_0".
    pub name: String,
    /// Host (o `user@host`) al que se conecta el canal remoto.
    pub endpoint: String,
}

impl WorkerConnection {
    pub const CAPACITY: usize = 1;

    pub fn new(index: usize, endpoint: impl Into<String>) -> Self {
        Self {
            index,
            name: format!("ssh_{}", index),
            endpoint: endpoint.into(),
        }
    }

    /// Conexión fuera del pool (ej: el host con GPU para enriquecimiento).
    pub fn named(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            index: 0,
            name: name.into(),
            endpoint: endpoint.into(),
        }
    }

    pub fn is_local(&self) -> bool {
        self.endpoint == LOCAL_ENDPOINT
    }
}

/// Arma el pool a partir de la lista de endpoints, en orden.
pub fn connection_pool(endpoints: &[String]) -> Vec<WorkerConnection> {
    endpoints
        .iter()
        .enumerate()
        .map(|(i, e)| WorkerConnection::new(i, e.clone()))
        .collect()
}
