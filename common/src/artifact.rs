use serde::{Deserialize, Serialize};

/// Esquema de las URIs de artefactos dentro del store.
pub const STORE_SCHEME: &str = "store://";

/* --------- Clases de almacenamiento --------- */

/// Categoría de datos; cada una vive en su propio bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageClass {
    Meta,
    Text,
    Image,
}

impl StorageClass {
    pub const ALL: [StorageClass; 3] = [StorageClass::Image, StorageClass::Text, StorageClass::Meta];

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageClass::Meta => "meta",
            StorageClass::Text => "text",
            StorageClass::Image => "image",
        }
    }
}

/* --------- Artefactos --------- */

/// Un artefacto direccionado por (bucket, directorio lógico, ruta).
///
/// La existencia de *cualquier* blob bajo el prefijo es la única señal de
/// idempotencia que usa el pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Artifact {
    pub bucket: String,
    /// Directorio de la corrida, ej: "2024-01-10-2024-01-17". Puede ir vacío.
    pub directory: String,
    /// Ruta relativa dentro del directorio, ej: "combined/combined.jsonl".
    pub path: String,
}

impl Artifact {
    pub fn new(
        bucket: impl Into<String>,
        directory: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            directory: directory.into(),
            path: path.into(),
        }
    }

    /// Clave del blob dentro del bucket.
    pub fn key(&self) -> String {
        join_key(&[&self.directory, &self.path])
    }

    /// Prefijo "de directorio" (con `/` final) para listar lo que hay debajo.
    pub fn dir_prefix(&self) -> String {
        let key = self.key();
        if key.is_empty() {
            key
        } else {
            format!("{}/", key)
        }
    }

    /// Prefijo que se chequea para decidir si el artefacto existe: un
    /// artefacto sin ruta es el directorio entero, con `/` final para no
    /// confundirlo con hermanos como `d2/`.
    pub fn presence_prefix(&self) -> String {
        if self.path.is_empty() {
            self.dir_prefix()
        } else {
            self.key()
        }
    }

    pub fn uri(&self) -> String {
        format!("{}{}/{}", STORE_SCHEME, self.bucket, self.key())
    }

    /// Artefacto hijo: misma raíz, `segment` agregado a la ruta.
    pub fn child(&self, segment: &str) -> Artifact {
        Artifact {
            bucket: self.bucket.clone(),
            directory: self.directory.clone(),
            path: join_key(&[&self.path, segment]),
        }
    }
}

impl std::fmt::Display for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key())
    }
}

/// Metadatos de un blob listado.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobMeta {
    pub name: String,
    pub size: u64,
}

/// Une segmentos con `/` ignorando los vacíos y las barras sobrantes.
pub fn join_key(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim_matches('/'))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Último segmento de la ruta (el "nombre de hoja").
pub fn leaf_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Todo lo anterior a la hoja, sin la barra final.
pub fn parent_key(name: &str) -> &str {
    match name.rfind('/') {
        Some(idx) => &name[..idx],
        None => "",
    }
}

/// Separa una URI `store://bucket/key` en (bucket, key).
pub fn parse_uri(uri: &str) -> Option<(&str, &str)> {
    let rest = uri.strip_prefix(STORE_SCHEME)?;
    let (bucket, key) = rest.split_once('/')?;
    if bucket.is_empty() || key.is_empty() {
        return None;
    }
    Some((bucket, key))
}
