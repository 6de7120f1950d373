//! Provider 线格式数据模型

pub mod gemini;
pub mod openai;
