//! Asignación round-robin de N ítems de trabajo sobre K conexiones.

use crate::error::{Error, Result};

/// Mapea el ítem `i` a la conexión `i mod K`. Puro y determinista:
/// no hay reasignación ante fallas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkAssigner {
    connections: usize,
}

impl WorkAssigner {
    /// Falla con `InvalidTopology` si no hay conexiones.
    pub fn new(connections: usize) -> Result<Self> {
        if connections == 0 {
            return Err(Error::InvalidTopology {
                reason: "el pool de conexiones está vacío (K = 0)".into(),
            });
        }
        Ok(Self { connections })
    }

    pub fn connections(&self) -> usize {
        self.connections
    }

    pub fn assign(&self, item: usize) -> usize {
        item % self.connections
    }

    pub fn owns(&self, connection: usize, item: usize) -> bool {
        self.assign(item) == connection
    }

    /// Ítems (en orden) que le tocan a `connection` dentro de `[0, items)`.
    pub fn owned_by(&self, connection: usize, items: usize) -> Vec<usize> {
        if connection >= self.connections {
            return Vec::new();
        }
        (connection..items).step_by(self.connections).collect()
    }

    /// Partición completa: posición `c` = ítems de la conexión `c`.
    pub fn partition(&self, items: usize) -> Vec<Vec<usize>> {
        (0..self.connections)
            .map(|c| self.owned_by(c, items))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn k_cero_es_topologia_invalida() {
        let err = WorkAssigner::new(0).unwrap_err();
        assert_eq!(err.kind(), "InvalidTopology");
    }

    #[test]
    fn diez_items_tres_conexiones() {
        let a = WorkAssigner::new(3).unwrap();
        assert_eq!(a.assign(7), 1);
        assert_eq!(a.owned_by(1, 10), vec![1, 4, 7]);
        assert_eq!(a.owned_by(0, 10), vec![0, 3, 6, 9]);
        assert!(a.owns(2, 8));
    }

    #[test]
    fn partition_cubre_todo_sin_solaparse() {
        for k in 1..6 {
            let a = WorkAssigner::new(k).unwrap();
            for n in 0..20 {
                let parts = a.partition(n);
                assert_eq!(parts.len(), k);

                let mut all: Vec<usize> = parts.concat();
                all.sort_unstable();
                assert_eq!(all, (0..n).collect::<Vec<_>>());

                for (c, owned) in parts.iter().enumerate() {
                    assert!(owned.iter().all(|&i| a.assign(i) == c));
                }
            }
        }
    }

    #[test]
    fn mas_conexiones_que_items_deja_conexiones_vacias() {
        let a = WorkAssigner::new(4).unwrap();
        assert_eq!(a.partition(2), vec![vec![0], vec![1], vec![], vec![]]);
        assert!(a.owned_by(9, 2).is_empty());
    }
}
