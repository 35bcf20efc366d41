//! LLM 服务 - 业务能力层
//!
//! 只负责"生成文本"能力，不关心调用它的是聊天、分析还是出题
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 Gemini 的 OpenAI 兼容端点、Azure 等）
//!
//! ## 失败语义
//! [`LlmService`] 返回 `Result`；面向用户的 [`Assistant`] 永不失败，
//! 出错时返回固定的提示文本。

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::error::LlmError;
use crate::utils::logging::truncate_text;

/// 未配置 API Key 时的提示
pub const MISSING_KEY_MESSAGE: &str = "Error: API Key no configurada. Por favor configura la variable de entorno LLM_API_KEY en tu archivo .env.";
/// 调用失败时的道歉文本
pub const CONNECTION_ERROR_MESSAGE: &str =
    "Lo siento, hubo un error al conectar con el asistente inteligente.";
/// 模型返回空内容时的提示
pub const EMPTY_RESPONSE_MESSAGE: &str = "No se pudo generar una respuesta.";
/// 聊天助手的开场白
pub const GREETING: &str = "¡Hola! Soy tu asistente pedagógico virtual. ¿En qué puedo ayudarte hoy? Puedo sugerir ideas para pruebas, redactar preguntas o explicar indicadores OA.";
/// 聊天时附带的应用上下文
pub const ASSISTANT_CONTEXT: &str = "El usuario está creando una prueba en Generador Docente Pro.";

const SUGGESTION_DISABLED_MESSAGE: &str =
    "Simulación: ¿Cuánto es 2 + 2? (Configura tu API Key para IA real)";
const SUGGESTION_ERROR_MESSAGE: &str = "Error generando ejercicio.";

/// 文本生成能力
///
/// `prompt` 是完整的提示词，由调用方负责拼装
pub trait TextGenerator: Send + Sync {
    fn model_name(&self) -> &str;

    fn generate<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, LlmError>>;
}

/// LLM 服务
///
/// 职责：
/// - 调用 OpenAI 兼容的 Chat Completions API
/// - 只处理单次请求，不保存对话历史
pub struct LlmService {
    client: Client<OpenAIConfig>,
    model_name: String,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
        }
    }

    /// 通用的 LLM 调用函数
    ///
    /// # 参数
    /// - `user_message`: 用户消息内容
    /// - `system_message`: 系统消息（可选）
    ///
    /// # 返回
    /// 去掉首尾空白后的响应内容
    pub async fn send_to_llm(
        &self,
        user_message: &str,
        system_message: Option<&str>,
    ) -> Result<String, LlmError> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", user_message.len());

        let failed = |e: async_openai::error::OpenAIError| LlmError::ApiCallFailed {
            model: self.model_name.clone(),
            message: e.to_string(),
        };

        let mut messages = Vec::new();
        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()
                .map_err(failed)?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()
            .map_err(failed)?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(0.7)
            .build()
            .map_err(failed)?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            failed(e)
        })?;

        debug!("LLM API 调用成功");

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
            .map(str::trim)
            .filter(|content| !content.is_empty())
            .map(str::to_string)
            .ok_or_else(|| LlmError::EmptyContent {
                model: self.model_name.clone(),
            })
    }
}

impl TextGenerator for LlmService {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn generate<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, LlmError>> {
        self.send_to_llm(prompt, None).boxed()
    }
}

/// 拼装"教学专家"提示词
///
/// `context` 为空时省略上下文行
pub fn build_full_prompt(prompt: &str, context: &str) -> String {
    let mut full = String::from("Actúa como un experto pedagogo y asistente docente.\n");
    if !context.trim().is_empty() {
        full.push_str(&format!("Contexto actual de la aplicación: {}\n", context.trim()));
    }
    full.push_str(&format!("\nUsuario pregunta: {}\n\n", prompt.trim()));
    full.push_str("Responde de manera concisa, útil y formativa.");
    full
}

/// 出题提示词
pub fn suggestion_prompt(topic: &str, grade: &str) -> String {
    format!(
        "Genera un ejercicio de selección múltiple para la asignatura de {}, nivel {}. Incluye el enunciado y 4 alternativas.",
        topic, grade
    )
}

/// 面向用户的助手
///
/// 所有方法都返回可直接展示的文本，从不返回错误
pub struct Assistant {
    generator: Option<Box<dyn TextGenerator>>,
}

impl Assistant {
    pub fn new(generator: Box<dyn TextGenerator>) -> Self {
        Self {
            generator: Some(generator),
        }
    }

    /// 未配置 API Key 的助手
    pub fn disabled() -> Self {
        Self { generator: None }
    }

    pub fn from_config(config: &Config) -> Self {
        if config.llm_enabled() {
            Self::new(Box::new(LlmService::new(config)))
        } else {
            Self::disabled()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.generator.is_some()
    }

    /// 自由提问
    pub async fn ask(&self, prompt: &str, context: &str) -> String {
        let Some(generator) = &self.generator else {
            return MISSING_KEY_MESSAGE.to_string();
        };

        debug!("🤖 提问 ({}): {}", generator.model_name(), truncate_text(prompt, 60));
        let full_prompt = build_full_prompt(prompt, context);
        match generator.generate(&full_prompt).await {
            Ok(text) => text,
            Err(LlmError::EmptyContent { model }) => {
                warn!("⚠️ 模型 {} 返回空内容", model);
                EMPTY_RESPONSE_MESSAGE.to_string()
            }
            Err(e) => {
                error!("❌ 助手调用失败: {}", e);
                CONNECTION_ERROR_MESSAGE.to_string()
            }
        }
    }

    /// 生成一道选择题
    pub async fn suggest_exercise(&self, topic: &str, grade: &str) -> String {
        let Some(generator) = &self.generator else {
            return SUGGESTION_DISABLED_MESSAGE.to_string();
        };

        match generator.generate(&suggestion_prompt(topic, grade)).await {
            Ok(text) => text,
            Err(LlmError::EmptyContent { .. }) => String::new(),
            Err(e) => {
                error!("❌ 生成题目失败: {}", e);
                SUGGESTION_ERROR_MESSAGE.to_string()
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// 固定返回结果并记录提示词的生成器
    pub(crate) struct ScriptedGenerator {
        reply: Result<String, fn() -> LlmError>,
        pub(crate) prompts: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        pub(crate) fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn failing(error: fn() -> LlmError) -> Self {
            Self {
                reply: Err(error),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    impl TextGenerator for ScriptedGenerator {
        fn model_name(&self) -> &str {
            "scripted"
        }

        fn generate<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, LlmError>> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let reply = match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(make) => Err(make()),
            };
            async move { reply }.boxed()
        }
    }

    fn timeout() -> LlmError {
        LlmError::ApiCallFailed {
            model: "scripted".to_string(),
            message: "timeout".to_string(),
        }
    }

    fn empty() -> LlmError {
        LlmError::EmptyContent {
            model: "scripted".to_string(),
        }
    }

    #[test]
    fn test_full_prompt_layout() {
        let prompt = build_full_prompt("¿Qué es un OA?", ASSISTANT_CONTEXT);
        assert!(prompt.starts_with("Actúa como un experto pedagogo"));
        assert!(prompt.contains("Contexto actual de la aplicación: El usuario está creando"));
        assert!(prompt.contains("Usuario pregunta: ¿Qué es un OA?"));
        assert!(prompt.ends_with("Responde de manera concisa, útil y formativa."));

        let without_context = build_full_prompt("Hola", "  ");
        assert!(!without_context.contains("Contexto actual"));
    }

    #[tokio::test]
    async fn test_disabled_assistant_explains_configuration() {
        let assistant = Assistant::disabled();
        assert!(!assistant.is_enabled());
        assert_eq!(assistant.ask("Hola", "").await, MISSING_KEY_MESSAGE);
        assert!(assistant
            .suggest_exercise("Matemáticas", "1° Básico")
            .await
            .starts_with("Simulación"));
    }

    #[tokio::test]
    async fn test_ask_returns_generated_text() {
        let generator = ScriptedGenerator::replying("Un OA es un objetivo de aprendizaje.");
        let assistant = Assistant::new(Box::new(generator));
        let answer = assistant.ask("¿Qué es un OA?", ASSISTANT_CONTEXT).await;
        assert_eq!(answer, "Un OA es un objetivo de aprendizaje.");
    }

    #[tokio::test]
    async fn test_ask_never_fails() {
        let assistant = Assistant::new(Box::new(ScriptedGenerator::failing(timeout)));
        assert_eq!(assistant.ask("Hola", "").await, CONNECTION_ERROR_MESSAGE);
        assert_eq!(
            assistant.suggest_exercise("Historia", "5° Básico").await,
            "Error generando ejercicio."
        );

        let assistant = Assistant::new(Box::new(ScriptedGenerator::failing(empty)));
        assert_eq!(assistant.ask("Hola", "").await, EMPTY_RESPONSE_MESSAGE);
    }

    #[test]
    fn test_suggestion_prompt() {
        assert_eq!(
            suggestion_prompt("Física", "II Medio"),
            "Genera un ejercicio de selección múltiple para la asignatura de Física, nivel II Medio. Incluye el enunciado y 4 alternativas."
        );
    }

    /// 测试真实 LLM 调用
    ///
    /// 运行方式：
    /// ```bash
    /// LLM_API_KEY=... cargo test test_send_to_llm_simple -- --ignored --nocapture
    /// ```
    #[tokio::test]
    #[ignore]
    async fn test_send_to_llm_simple() {
        let _ = tracing_subscriber::fmt::try_init();

        let config = Config::from_env().unwrap();
        let service = LlmService::new(&config);

        let result = service
            .send_to_llm("Di hola en una palabra.", Some("Eres un asistente breve."))
            .await;

        match result {
            Ok(response) => {
                println!("✅ LLM 响应: {}", response);
                assert!(!response.is_empty());
            }
            Err(e) => panic!("LLM 调用失败: {}", e),
        }
    }
}
