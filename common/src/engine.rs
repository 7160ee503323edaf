use serde_json::{json, Value};
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::job::MergeKind;

/// Tipo genérico de registro (fila de datos).
/// Los artefactos son JSON Lines: un objeto por línea.
pub type Record = Value;

/// Colección en memoria de registros.
pub type Records = Vec<Record>;

pub const USER_URL_BASE: &str = "https://www.reddit.com/user/";

/* =========================
   Operadores genéricos
   ========================= */

/// map: aplica una función a cada registro y devuelve una nueva colección.
pub fn op_map<F>(input: Records, f: F) -> Records
where
    F: Fn(&Record) -> Record,
{
    input.into_iter().map(|rec| f(&rec)).collect()
}

/* =========================
   JOIN en memoria
   ========================= */

/// Fusiona dos registros JSON en uno solo.
/// - el campo `key_field` se mantiene una sola vez
/// - si un campo existe en ambos lados, se respeta el del lado izquierdo
///   y el del derecho se guarda con prefijo `right_`.
fn merge_records(left: &Record, right: &Record, key_field: &str) -> Record {
    let mut obj = serde_json::Map::new();

    if let Some(lobj) = left.as_object() {
        for (k, v) in lobj {
            obj.insert(k.clone(), v.clone());
        }
    }

    if let Some(robj) = right.as_object() {
        for (k, v) in robj {
            if k == key_field {
                continue;
            }
            if obj.contains_key(k) {
                obj.insert(format!("right_{}", k), v.clone());
            } else {
                obj.insert(k.clone(), v.clone());
            }
        }
    }

    Value::Object(obj)
}

/// Left join en memoria por `key_field`. Los registros de la izquierda sin
/// pareja pasan tal cual; con M parejas generan M registros.
pub fn op_left_join_by_key(left: Records, right: Records, key_field: &str) -> Records {
    let mut index: HashMap<String, Vec<Record>> = HashMap::new();
    for rec in right {
        if let Some(k) = rec.get(key_field).and_then(|v| v.as_str()) {
            index.entry(k.to_string()).or_default().push(rec);
        }
    }

    let mut out = Vec::new();
    for lrec in left {
        let matches = lrec
            .get(key_field)
            .and_then(|v| v.as_str())
            .and_then(|k| index.get(k));

        match matches {
            Some(rs) => {
                for rrec in rs {
                    out.push(merge_records(&lrec, rrec, key_field));
                }
            }
            None => out.push(lrec),
        }
    }
    out
}

/* =========================
   Proyecciones de los merges
   ========================= */

fn str_field<'a>(rec: &'a Record, field: &str) -> Option<&'a str> {
    rec.get(field).and_then(|v| v.as_str())
}

/// `{id, text}`: el texto con el caption de la imagen pegado al final, si hay.
fn project_caption_text(rec: &Record) -> Record {
    let text = match (str_field(rec, "text"), str_field(rec, "image_caption")) {
        (Some(t), Some(c)) => json!(format!("{}{}", t, c)),
        (Some(t), None) => json!(t),
        (None, _) => Value::Null,
    };
    json!({ "id": rec.get("id").cloned().unwrap_or(Value::Null), "text": text })
}

/// Metadatos + `author_url` + texto y sentimiento.
fn project_meta_text(rec: &Record) -> Record {
    let field = |name: &str| rec.get(name).cloned().unwrap_or(Value::Null);
    let author_url = match str_field(rec, "author_name") {
        Some(name) => json!(format!("{}{}", USER_URL_BASE, name)),
        None => Value::Null,
    };
    json!({
        "id": field("id"),
        "url": field("url"),
        "score": field("score"),
        "author_url": author_url,
        "author_name": field("author_name"),
        "parent": field("parent"),
        "create_date": field("create_date"),
        "subreddit": field("subreddit"),
        "text": field("text"),
        "sentiment": field("sentiment"),
    })
}

/// Left join por `id` de `left` con `right` y proyección según `kind`.
pub fn merge_two(left: Records, right: Records, kind: MergeKind) -> Records {
    let joined = op_left_join_by_key(left, right, "id");
    match kind {
        MergeKind::CaptionText => op_map(joined, project_caption_text),
        MergeKind::MetaText => op_map(joined, project_meta_text),
    }
}

/// Ruta donde se guarda la imagen descargada: `{directory}/images/<hoja de la url>`.
pub fn image_path_for(directory: &str, image_url: &str) -> String {
    let leaf = image_url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(image_url);
    format!("{}/images/{}", directory, leaf)
}

/// Agrega `image_path` a cada fila que tenga `image_url`.
pub fn with_image_paths(input: Records, directory: &str) -> Records {
    op_map(input, |r| {
        let mut o = r.clone();
        if let Some(url) = str_field(r, "image_url") {
            o["image_path"] = json!(image_path_for(directory, url));
        }
        o
    })
}

/* =========================
   Lectura / escritura
   ========================= */

/// Una línea = un objeto; las líneas vacías se ignoran.
pub fn parse_jsonl(bytes: &[u8]) -> Result<Records> {
    let text = String::from_utf8_lossy(bytes);
    let mut out = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        out.push(serde_json::from_str(line)?);
    }
    Ok(out)
}

pub fn to_jsonl(records: &[Record]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for rec in records {
        serde_json::to_writer(&mut out, rec)?;
        out.push(b'\n');
    }
    Ok(out)
}

/// CSV con encabezado = unión de campos en orden de aparición.
pub fn records_to_csv(records: &[Record]) -> Result<Vec<u8>> {
    let mut headers: Vec<String> = Vec::new();
    for rec in records {
        if let Some(obj) = rec.as_object() {
            for k in obj.keys() {
                if !headers.contains(k) {
                    headers.push(k.clone());
                }
            }
        }
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    if !headers.is_empty() {
        writer
            .write_record(&headers)
            .map_err(|e| Error::Io(e.into()))?;
    }

    for rec in records {
        let row: Vec<String> = headers
            .iter()
            .map(|h| match rec.get(h) {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            })
            .collect();
        writer.write_record(&row).map_err(|e| Error::Io(e.into()))?;
    }

    writer.into_inner().map_err(|e| Error::Io(e.into_error()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_map_aplica_funcion_a_cada_registro() {
        let input = vec![json!({"x": 1}), json!({"x": 2})];

        let out = op_map(input, |r| {
            let mut o = r.clone();
            let v = o["x"].as_i64().unwrap();
            o["x"] = json!(v * 10);
            o
        });

        assert_eq!(out, vec![json!({"x": 10}), json!({"x": 20})]);
    }

    #[test]
    fn merge_records_respeta_campos_izquierda_y_prefija_derecha() {
        let left = json!({"id": "u1", "x": 1, "compartido": "L"});
        let right = json!({"id": "u1", "y": 2, "compartido": "R"});

        let merged = super::merge_records(&left, &right, "id");

        assert_eq!(merged["id"], json!("u1"));
        assert_eq!(merged["x"], json!(1));
        assert_eq!(merged["y"], json!(2));
        assert_eq!(merged["compartido"], json!("L"));
        assert_eq!(merged["right_compartido"], json!("R"));
    }

    #[test]
    fn op_left_join_conserva_izquierda_sin_pareja() {
        let left = vec![json!({"id": "a", "v": 1}), json!({"id": "b", "v": 2})];
        let right = vec![json!({"id": "a", "w": 9}), json!({"id": "z", "w": 0})];

        let out = op_left_join_by_key(left, right, "id");

        assert_eq!(out.len(), 2);
        assert_eq!(out[0], json!({"id": "a", "v": 1, "w": 9}));
        assert_eq!(out[1], json!({"id": "b", "v": 2}));
    }

    #[test]
    fn merge_caption_text_pega_el_caption_cuando_existe() {
        let text = vec![
            json!({"id": "p1", "text": "hola "}),
            json!({"id": "p2", "text": "sin imagen"}),
            json!({"id": "p3", "text": null}),
        ];
        let captions = vec![
            json!({"id": "p1", "image_url": "u", "image_path": "d/images/u", "image_caption": "un perro"}),
            json!({"id": "p3", "image_caption": "algo"}),
        ];

        let out = merge_two(text, captions, MergeKind::CaptionText);

        assert_eq!(out[0], json!({"id": "p1", "text": "hola un perro"}));
        assert_eq!(out[1], json!({"id": "p2", "text": "sin imagen"}));
        assert_eq!(out[2], json!({"id": "p3", "text": null}));
    }

    #[test]
    fn merge_meta_text_arma_author_url() {
        let meta = vec![
            json!({"id": "p1", "url": "u", "score": 3, "author_id": "x", "author_name": "ana",
                   "parent": null, "create_date": "2024-01-15", "subreddit": "ucla"}),
            json!({"id": "c1", "url": "v", "score": 0, "author_id": null, "author_name": null,
                   "parent": "p1", "create_date": "2024-01-15", "subreddit": "ucla"}),
        ];
        let sentiment = vec![json!({"id": "p1", "text": "hola", "sentiment": 1})];

        let out = merge_two(meta, sentiment, MergeKind::MetaText);

        assert_eq!(out[0]["author_url"], json!("https://www.reddit.com/user/ana"));
        assert_eq!(out[0]["sentiment"], json!(1));
        assert_eq!(out[0]["text"], json!("hola"));
        assert!(out[0].get("author_id").is_none());
        assert_eq!(out[1]["author_url"], Value::Null);
        assert_eq!(out[1]["sentiment"], Value::Null);
        assert_eq!(out[1]["parent"], json!("p1"));
    }

    #[test]
    fn with_image_paths_usa_la_hoja_de_la_url() {
        let rows = vec![json!({"id": "p1", "image_url": "https://i.redd.it/abc.jpg"})];
        let out = with_image_paths(rows, "2024-01-10-2024-01-17");
        assert_eq!(
            out[0]["image_path"],
            json!("2024-01-10-2024-01-17/images/abc.jpg")
        );
    }

    #[test]
    fn parse_jsonl_ignora_lineas_vacias() {
        let bytes = b"{\"id\":\"a\"}\n\n{\"id\":\"b\"}\n";
        let recs = parse_jsonl(bytes).unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(to_jsonl(&recs).unwrap(), b"{\"id\":\"a\"}\n{\"id\":\"b\"}\n".to_vec());
    }

    #[test]
    fn records_to_csv_une_encabezados() {
        let recs = vec![json!({"a": "x", "b": 1}), json!({"a": "y,z", "c": null})];
        let csv = String::from_utf8(records_to_csv(&recs).unwrap()).unwrap();
        assert_eq!(csv, "a,b,c\nx,1,\n\"y,z\",,\n");
    }
}
