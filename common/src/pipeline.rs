//! Armado del grafo de la corrida completa.

use crate::annotate::Annotation;
use crate::artifact::StorageClass;
use crate::assign::WorkAssigner;
use crate::config::RunContext;
use crate::dag::PipelineGraph;
use crate::error::Result;
use crate::job::MergeKind;
use crate::task::{StageKind, TaskId};

/* --------- Rutas fijas por etapa (relativas al directorio de la corrida) --------- */

pub const COMBINED_DIR: &str = "combined";
pub const COMBINED_FILE: &str = "combined.jsonl";
pub const COMBINED_PATH: &str = "combined/combined.jsonl";

pub const IMAGE_CAPTION_PATH: &str = "image_caption/image_caption.jsonl";

pub const IMAGE_TEXT_DIR: &str = "image_text";
pub const IMAGE_TEXT_FILE: &str = "image_text.jsonl";
pub const IMAGE_TEXT_PATH: &str = "image_text/image_text.jsonl";

pub const SENTIMENT_PATH: &str = "image_text_sentiment/image_text_sentiment.jsonl";

pub const META_TEXT_DIR: &str = "meta_text_merge";
pub const META_TEXT_FILE: &str = "meta_text.jsonl";
pub const META_TEXT_PATH: &str = "meta_text_merge/meta_text.jsonl";

/* --------- Ids de tareas --------- */

pub const INIT_TASK: &str = "project_init";
pub const GPU_PULL_CAPTION_TASK: &str = "gpu_pull_caption";
pub const GPU_PULL_SENTIMENT_TASK: &str = "gpu_pull_sentiment";
pub const CAPTION_TASK: &str = "generate_image_caption";
pub const CAPTION_MERGE_TASK: &str = "merge_image_caption_text";
pub const SENTIMENT_TASK: &str = "sentiment_analysis";
pub const META_MERGE_TASK: &str = "merge_meta_text";
pub const LOAD_TASK: &str = "load_to_warehouse";
pub const REPORT_TASK: &str = "generate_report";

pub fn pull_task(connection: usize) -> TaskId {
    format!("pull_vm_images_at_ssh_{}", connection)
}

pub fn collect_task(source: &str) -> TaskId {
    format!("scraping_{}", source)
}

pub fn merge_task(class: StorageClass) -> TaskId {
    format!("merge_{}", class.as_str())
}

pub fn fetch_task(connection: usize) -> TaskId {
    format!("image_scraping_{}", connection)
}

/// Construye y valida el grafo de la corrida.
pub fn build_pipeline(ctx: &RunContext) -> Result<PipelineGraph> {
    let cfg = &ctx.config;
    let pool = ctx.connections();
    let assigner = WorkAssigner::new(pool.len())?;
    let gpu = ctx.enrichment();

    let mut g = PipelineGraph::new();

    // 1) init
    let init = g.add_task(INIT_TASK, StageKind::Init, vec![])?;

    // 2) imágenes en cada conexión del pool
    let pulls: Vec<TaskId> = pool
        .iter()
        .map(|conn| {
            g.add_task(
                pull_task(conn.index),
                StageKind::PullImage {
                    connection: conn.clone(),
                    images: vec![cfg.images.collect.clone(), cfg.images.fetch_media.clone()],
                },
                vec![init.clone()],
            )
        })
        .collect::<Result<_>>()?;

    // 3) una recolección por fuente, en la conexión que le toca
    let mut collects = Vec::with_capacity(cfg.sources.len());
    for (item, source) in cfg.sources.iter().enumerate() {
        let c = assigner.assign(item);
        collects.push(g.add_task(
            collect_task(source),
            StageKind::Collect {
                item,
                source: source.clone(),
                connection: pool[c].clone(),
            },
            vec![pulls[c].clone()],
        )?);
    }

    // 4) merge por clase; cada uno espera todas las recolecciones
    let mut merges = std::collections::HashMap::new();
    for class in StorageClass::ALL {
        let id = g.add_task(
            merge_task(class),
            StageKind::MergeDirectory { class },
            collects.clone(),
        )?;
        merges.insert(class, id);
    }
    let merge_image = merges[&StorageClass::Image].clone();
    let merge_text = merges[&StorageClass::Text].clone();
    let merge_meta = merges[&StorageClass::Meta].clone();

    // 5) descarga de imágenes repartida en el mismo pool
    let fetches: Vec<TaskId> = (0..pool.len())
        .map(|i| {
            let c = assigner.assign(i);
            g.add_task(
                fetch_task(i),
                StageKind::FetchMedia {
                    connection: pool[c].clone(),
                    connections: assigner.connections(),
                },
                vec![merge_image.clone(), pulls[c].clone()],
            )
        })
        .collect::<Result<_>>()?;

    // 6) caption
    let pull_caption = g.add_task(
        GPU_PULL_CAPTION_TASK,
        StageKind::PullImage {
            connection: gpu.clone(),
            images: vec![cfg.images.caption.clone()],
        },
        vec![init.clone()],
    )?;
    let mut caption_inputs = fetches;
    caption_inputs.push(pull_caption);
    let caption = g.add_task(
        CAPTION_TASK,
        StageKind::Annotate {
            annotation: Annotation::Caption,
            connection: gpu.clone(),
        },
        caption_inputs,
    )?;

    // 7) texto + caption
    let caption_merge = g.add_task(
        CAPTION_MERGE_TASK,
        StageKind::MergeTwo {
            merge: MergeKind::CaptionText,
        },
        vec![caption, merge_text],
    )?;

    // 8) sentimiento
    let pull_sentiment = g.add_task(
        GPU_PULL_SENTIMENT_TASK,
        StageKind::PullImage {
            connection: gpu.clone(),
            images: vec![cfg.images.sentiment.clone()],
        },
        vec![init],
    )?;
    let sentiment = g.add_task(
        SENTIMENT_TASK,
        StageKind::Annotate {
            annotation: Annotation::Sentiment,
            connection: gpu,
        },
        vec![caption_merge, pull_sentiment],
    )?;

    // 9) metadatos + texto/sentimiento
    let meta_merge = g.add_task(
        META_MERGE_TASK,
        StageKind::MergeTwo {
            merge: MergeKind::MetaText,
        },
        vec![merge_meta, sentiment],
    )?;

    // 10) y 11)
    let load = g.add_task(LOAD_TASK, StageKind::LoadWarehouse, vec![meta_merge])?;
    g.add_task(REPORT_TASK, StageKind::Report, vec![load])?;

    g.validate()?;
    Ok(g)
}
