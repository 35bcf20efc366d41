use std::path::Path;

use exam_generator::error::StorageError;
use exam_generator::infrastructure::{
    DirSource, DocumentDecoder, ExerciseStorage, JsonDirStorage, MemoryStorage, SettingsStore,
    StandardDecoder, MANIFEST_NAME,
};
use exam_generator::models::document::Block;
use exam_generator::models::exercise::{Difficulty, ExerciseType, ParsedExercise};
use exam_generator::models::filter::FilterState;
use exam_generator::orchestrator::{import_files, BatchMetadata, DemoLoader};
use exam_generator::services::composer;
use exam_generator::{AppState, ExamMeta, Exercise, ExerciseBody, GlobalSettings, Variant};
use futures::future::BoxFuture;
use futures::FutureExt;
use pretty_assertions::assert_eq;

fn exercise(id: &str, subject: &str, grade: &str, content: &str, skill: &str, answer: &str) -> Exercise {
    Exercise {
        id: id.to_string(),
        filename: format!("{}.docx", id),
        content: content.to_string(),
        body: ExerciseBody::Plain,
        parsed: ParsedExercise {
            student_text: content.to_string(),
            answer_key: answer.to_string(),
            skill: skill.to_string(),
            extracted: true,
        },
        subject: subject.to_string(),
        grade: grade.to_string(),
        oa: "OA 01".to_string(),
        indicator: "Indicador".to_string(),
        exercise_type: ExerciseType::MultipleChoice,
        difficulty: Difficulty::Basic,
        tags: Vec::new(),
    }
}

fn mat_001() -> Exercise {
    exercise(
        "mat-001",
        "Matemáticas",
        "1° Básico",
        "¿Cuánto es 3 + 4?\nA) 6\nB) 7\nC) 8",
        "Habilidad: Resolver problemas",
        "Respuesta: B",
    )
}

fn len_001() -> Exercise {
    exercise(
        "len-001",
        "Lenguaje",
        "1° Básico",
        "¿Cuál palabra es un sustantivo?\nA) correr\nB) azul\nC) casa",
        "Habilidad: Identificar",
        "Respuesta: C",
    )
}

/// 空的示例题库目录
fn no_demo(dir: &Path) -> DemoLoader {
    DemoLoader::new(Box::new(DirSource::new(dir)), Box::new(StandardDecoder))
}

async fn state_with(storage: Box<dyn ExerciseStorage>, dir: &Path) -> AppState {
    AppState::initialize(storage, None, no_demo(dir)).await
}

/// 所有操作都失败的存储
struct BrokenStorage;

impl BrokenStorage {
    fn error() -> StorageError {
        StorageError::Unavailable("disco lleno".to_string())
    }
}

impl ExerciseStorage for BrokenStorage {
    fn get_all(&self) -> BoxFuture<'_, Result<Vec<Exercise>, StorageError>> {
        async { Err(Self::error()) }.boxed()
    }

    fn put<'a>(&'a self, _exercise: &'a Exercise) -> BoxFuture<'a, Result<(), StorageError>> {
        async { Err(Self::error()) }.boxed()
    }

    fn delete<'a>(&'a self, _id: &'a str) -> BoxFuture<'a, Result<(), StorageError>> {
        async { Err(Self::error()) }.boxed()
    }

    fn clear(&self) -> BoxFuture<'_, Result<(), StorageError>> {
        async { Err(Self::error()) }.boxed()
    }
}

#[tokio::test]
async fn test_teacher_document_with_spec_table() {
    let dir = tempfile::tempdir().unwrap();
    let storage = MemoryStorage::with_exercises(vec![mat_001(), len_001()]);
    let mut state = state_with(Box::new(storage), dir.path()).await;

    assert!(state.toggle_selection("mat-001"));
    assert!(state.toggle_selection("len-001"));
    assert!(state.settings().include_spec_table);

    let meta = ExamMeta {
        title: "Prueba de Diagnóstico".to_string(),
        grade: "1° Básico".to_string(),
        subject: "Matemáticas".to_string(),
    };
    let tree = state.compose(Variant::Teacher, &meta).unwrap();

    let labels: Vec<String> = tree
        .paragraphs()
        .map(|p| p.text())
        .filter(|text| text.starts_with("Pregunta "))
        .collect();
    assert_eq!(labels, vec!["Pregunta 1:", "Pregunta 2:"]);

    let tables: Vec<_> = tree.tables().collect();
    assert_eq!(tables.len(), 1);
    let rows: Vec<Vec<&str>> = tables[0]
        .rows
        .iter()
        .map(|row| row.iter().map(|cell| cell.text.as_str()).collect())
        .collect();
    assert_eq!(
        rows,
        vec![
            vec!["N°", "Habilidad", "Respuesta"],
            vec!["1", "Habilidad: Resolver problemas", "Respuesta: B"],
            vec!["2", "Habilidad: Identificar", "Respuesta: C"],
        ]
    );
    assert!(tree.blocks.iter().any(|block| matches!(block, Block::PageBreak)));

    // 同样的输入得到同样的树
    assert_eq!(state.compose(Variant::Teacher, &meta).unwrap(), tree);
}

#[tokio::test]
async fn test_student_document_hides_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let mut rich = mat_001();
    rich.body = ExerciseBody::RichText {
        html: "<p>¿Cuánto es 3 + 4?</p><p>Respuesta: B</p><p>Habilidad: Resolver problemas</p>"
            .to_string(),
        original: None,
    };
    let storage = MemoryStorage::with_exercises(vec![rich, len_001()]);
    let mut state = state_with(Box::new(storage), dir.path()).await;
    state.toggle_selection("mat-001");
    state.toggle_selection("len-001");

    let tree = state.compose(Variant::Student, &ExamMeta::default()).unwrap();
    for paragraph in tree.paragraphs() {
        let text = paragraph.text();
        assert!(!text.contains("Respuesta:"), "{}", text);
        assert!(!text.contains("Habilidad:"), "{}", text);
    }
    assert_eq!(tree.tables().count(), 0);
}

#[tokio::test]
async fn test_filter_by_subject_and_grade() {
    let dir = tempfile::tempdir().unwrap();
    let mut mat_002 = mat_001();
    mat_002.id = "mat-002".to_string();
    mat_002.grade = "7° Básico".to_string();
    let storage = MemoryStorage::with_exercises(vec![mat_001(), mat_002, len_001()]);
    let state = state_with(Box::new(storage), dir.path()).await;

    let filters = FilterState::new("Matemáticas", "1° Básico");
    let ids: Vec<&str> = state
        .filtered(&filters)
        .into_iter()
        .map(|ex| ex.id.as_str())
        .collect();
    assert_eq!(ids, vec!["mat-001"]);
}

#[tokio::test]
async fn test_json_storage_survives_restart() {
    let data = tempfile::tempdir().unwrap();
    let exercises_dir = data.path().join("exercises");

    {
        let mut state = state_with(Box::new(JsonDirStorage::new(&exercises_dir)), data.path()).await;
        assert_eq!(state.store().len(), 0);
        state.add_exercise(mat_001()).await;
        state.add_exercise(len_001()).await;
        state.delete_exercise("len-001").await;
    }

    let state = state_with(Box::new(JsonDirStorage::new(&exercises_dir)), data.path()).await;
    assert_eq!(state.store().len(), 1);
    assert_eq!(state.get("mat-001"), Some(&mat_001()));
}

#[tokio::test]
async fn test_delete_cascades_and_reorder() {
    let dir = tempfile::tempdir().unwrap();
    let storage = MemoryStorage::with_exercises(vec![mat_001(), len_001()]);
    let mut state = state_with(Box::new(storage), dir.path()).await;

    state.toggle_selection("mat-001");
    state.toggle_selection("len-001");
    state.reorder_selection(&["len-001".to_string(), "mat-001".to_string()]);
    let order: Vec<&str> = state.selected().iter().map(|ex| ex.id.as_str()).collect();
    assert_eq!(order, vec!["len-001", "mat-001"]);

    assert!(state.move_selected(0, 1));
    assert!(!state.move_selected(1, 1));

    state.delete_exercise("mat-001").await;
    assert_eq!(state.selection().ids(), ["len-001".to_string()]);
    assert!(state.get("mat-001").is_none());
}

#[tokio::test]
async fn test_storage_failure_keeps_memory_state() {
    let bank = tempfile::tempdir().unwrap();
    tokio::fs::write(bank.path().join(MANIFEST_NAME), "[]").await.unwrap();

    let mut state = state_with(Box::new(BrokenStorage), bank.path()).await;
    assert_eq!(state.store().len(), 0);

    assert!(state.add_exercise(mat_001()).await);
    assert!(state.toggle_selection("mat-001"));
    assert_eq!(state.selected().len(), 1);

    assert!(state.delete_exercise("mat-001").await);
    assert!(state.selection().is_empty());
}

#[tokio::test]
async fn test_demo_bank_fallback_and_restore() {
    let bank = tempfile::tempdir().unwrap();
    tokio::fs::create_dir_all(bank.path().join("historia")).await.unwrap();
    tokio::fs::write(
        bank.path().join(MANIFEST_NAME),
        r#"[{
            "path": "historia/pueblos originarios.txt",
            "subject": "Historia",
            "grade": "3° Básico",
            "oa": "OA 02",
            "indicator": "Reconoce pueblos",
            "difficulty": "Avanzada",
            "type": "Desarrollo"
        }]"#,
    )
    .await
    .unwrap();
    tokio::fs::write(
        bank.path().join("historia/pueblos originarios.txt"),
        "Nombra dos pueblos originarios de Chile.\nClave: Mapuche, Aymara\nDestreza: Recordar",
    )
    .await
    .unwrap();

    let data = tempfile::tempdir().unwrap();
    let mut state = AppState::initialize(
        Box::new(JsonDirStorage::new(data.path())),
        Some(SettingsStore::new(data.path().join("settings.toml"))),
        no_demo(bank.path()),
    )
    .await;

    let demo = state.get("demo-historia-pueblos-originarios-txt").unwrap().clone();
    assert_eq!(demo.filename, "pueblos originarios.txt");
    assert_eq!(demo.tags, vec!["historia".to_string()]);
    assert_eq!(demo.parsed.answer_key, "Mapuche, Aymara");
    assert_eq!(demo.parsed.skill, "Recordar");
    assert_eq!(demo.parsed.student_text, "Nombra dos pueblos originarios de Chile.");

    state.delete_all().await;
    assert_eq!(state.store().len(), 0);
    assert_eq!(state.restore_demo().await, 1);
    assert_eq!(JsonDirStorage::new(data.path()).get_all().await.unwrap().len(), 1);
    assert_eq!(state.settings(), &GlobalSettings::default());

    // 恢复前新增的题目在内存和存储中都被替换掉
    assert!(state.add_exercise(mat_001()).await);
    assert_eq!(JsonDirStorage::new(data.path()).get_all().await.unwrap().len(), 2);
    assert_eq!(state.restore_demo().await, 1);
    assert!(state.get("mat-001").is_none());

    let persisted = JsonDirStorage::new(data.path()).get_all().await.unwrap();
    let ids: Vec<&str> = persisted.iter().map(|ex| ex.id.as_str()).collect();
    assert_eq!(ids, vec!["demo-historia-pueblos-originarios-txt"]);

    let restarted = AppState::initialize(
        Box::new(JsonDirStorage::new(data.path())),
        None,
        no_demo(bank.path()),
    )
    .await;
    assert_eq!(restarted.store().len(), 1);
    assert!(restarted.get("mat-001").is_none());
}

#[tokio::test]
async fn test_import_then_export_docx() {
    let work = tempfile::tempdir().unwrap();
    let good = work.path().join("ecuacion.txt");
    let bad = work.path().join("imagen.png");
    tokio::fs::write(&good, "Resuelve 2x = 10\nRespuesta: 5\nHabilidad: Modelar").await.unwrap();
    tokio::fs::write(&bad, b"\x89PNG").await.unwrap();

    let mut state = state_with(Box::new(MemoryStorage::new()), work.path()).await;
    let report = import_files(
        &mut state,
        &StandardDecoder,
        &[good, bad.clone()],
        &BatchMetadata::default(),
    )
    .await;
    assert_eq!(report.imported.len(), 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, bad);

    let id = report.imported[0].clone();
    let imported = state.get(&id).unwrap();
    assert_eq!(imported.tags, vec!["lote".to_string()]);
    assert_eq!(imported.parsed.answer_key, "5");

    state.toggle_selection(&id);
    let meta = ExamMeta {
        title: "Guía de  Álgebra".to_string(),
        grade: "8° Básico".to_string(),
        subject: "Matemáticas".to_string(),
    };
    let out = work.path().join("salida");
    let path = state.export(Variant::Student, &meta, &out).await.unwrap();
    assert_eq!(path, out.join("Guía_de_Álgebra_Estudiante.docx"));
    assert_eq!(
        composer::export_filename(&meta.title, Variant::Teacher),
        "Guía_de_Álgebra_Pauta"
    );

    let bytes = tokio::fs::read(&path).await.unwrap();
    let decoded = StandardDecoder.decode("salida.docx", &bytes).unwrap();
    assert!(decoded.content.contains("Pregunta 1:"));
    assert!(decoded.content.contains("Resuelve 2x = 10"));
    assert!(!decoded.content.contains("Respuesta:"));
}
