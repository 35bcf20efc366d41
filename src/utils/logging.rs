/// 日志工具模块
///
/// 提供日志初始化和输出的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化日志
///
/// `RUST_LOG` 优先；否则 `verbose` 为 true 时输出 debug 级别
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("exam_generator={}", default_level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(exercise_count: usize, from_demo: bool) {
    info!("{}", "=".repeat(60));
    info!("🚀 题库已加载: {} 道题目", exercise_count);
    if from_demo {
        info!("📦 数据来源: 示例题库");
    } else {
        info!("💾 数据来源: 本地存储");
    }
    info!("{}", "=".repeat(60));
}

/// 记录批量导入完成信息
///
/// # 参数
/// - `imported`: 成功数量
/// - `failed`: 失败数量
pub fn log_batch_complete(imported: usize, failed: usize) {
    info!("{}", "─".repeat(60));
    info!("✓ 导入完成: 成功 {} 个, 失败 {} 个", imported, failed);
    info!("{}", "─".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（字符数）
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("Pregunta", 20), "Pregunta");
        assert_eq!(truncate_text("¿Cuánto es dos más dos?", 6), "¿Cuánt...");
    }
}
