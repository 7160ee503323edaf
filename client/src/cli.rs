use anyhow::Result;
use clap::{Parser, Subcommand};
use common::status::{RunInfo, TaskInfo};
use reqwest::Client;
use std::env;

/// Igual que en el worker:
/// - En Docker: MASTER_URL=http://master:8080
/// - Local: default http://localhost:8080
fn master_base_url() -> String {
    env::var("MASTER_URL").unwrap_or_else(|_| "http://localhost:8080".to_string())
}

#[derive(Parser)]
#[command(name = "client")]
#[command(about = "CLI simple para consultar la corrida en el master")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estado general de la corrida
    Status,
    /// Lista todas las tareas del grafo
    Tasks,
    /// Detalle de una tarea
    Task {
        #[arg(value_name = "TASK_ID")]
        id: String,
    },
}

fn print_run(run: &RunInfo) {
    println!("Corrida {}:", run.directory);
    println!("  estado: {:?}", run.status);
    println!(
        "  tareas: total={}, pendientes={}, corriendo={}, ok={}, fallidas={}, salteadas={}",
        run.total_tasks, run.pending, run.running, run.succeeded, run.failed, run.skipped
    );
    let done = run.succeeded + run.failed + run.skipped;
    if run.total_tasks > 0 {
        let pct = (done as f64 / run.total_tasks as f64) * 100.0;
        println!("  progreso: {:.1}%", pct);
    } else {
        println!("  progreso: (sin tareas)");
    }
    if let Some(ref started) = run.started_at {
        println!("  iniciada: {}", started);
    }
    if let Some(ref finished) = run.finished_at {
        println!("  finalizada: {}", finished);
    }
    if let Some(ref err) = run.first_error {
        println!("  primer error: {} en {}: {}", err.kind, err.task, err.message);
    }
}

fn task_line(t: &TaskInfo) -> String {
    let mut line = format!("{:<32} {:<10?} {}", t.id, t.status, t.stage);
    if let Some(ref conn) = t.connection {
        line.push_str(&format!(" @{}", conn));
    }
    if t.already_done {
        line.push_str(" (ya hecha)");
    }
    line
}

fn print_task(t: &TaskInfo) {
    println!("Tarea {}:", t.id);
    println!("  etapa: {}", t.stage);
    println!("  estado: {:?}", t.status);
    if let Some(ref conn) = t.connection {
        println!("  conexión: {}", conn);
    }
    if t.inputs.is_empty() {
        println!("  depende de: (nada)");
    } else {
        println!("  depende de: {}", t.inputs.join(", "));
    }
    if let Some(ref started) = t.started_at {
        println!("  iniciada: {}", started);
    }
    if let Some(ref finished) = t.finished_at {
        println!("  finalizada: {}", finished);
    }
    if t.already_done {
        println!("  la salida ya existía");
    }
    if let Some(ref err) = t.error {
        println!("  error: {}: {}", err.kind, err.message);
    }
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let client = Client::new();
    let base_url = master_base_url();

    match cli.command {
        Commands::Status => {
            let url = format!("{}/api/v1/run", base_url);
            let resp = client.get(&url).send().await?;
            if resp.status().is_success() {
                let run: RunInfo = resp.json().await?;
                print_run(&run);
            } else {
                println!("Error consultando la corrida (status {})", resp.status());
            }
        }

        Commands::Tasks => {
            let url = format!("{}/api/v1/tasks", base_url);
            let resp = client.get(&url).send().await?;
            if resp.status().is_success() {
                let tasks: Vec<TaskInfo> = resp.json().await?;
                if tasks.is_empty() {
                    println!("La corrida todavía no registró tareas.");
                }
                for t in &tasks {
                    println!("{}", task_line(t));
                }
            } else {
                println!("Error consultando /api/v1/tasks (status {})", resp.status());
            }
        }

        Commands::Task { id } => {
            let url = format!("{}/api/v1/tasks/{id}", base_url);
            let resp = client.get(&url).send().await?;
            if resp.status().is_success() {
                let task: TaskInfo = resp.json().await?;
                print_task(&task);
            } else {
                println!("No se encontró la tarea {id}");
            }
        }
    }

    Ok(())
}
