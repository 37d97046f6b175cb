pub const CONTEXTUALIZE_PROMPT: &str = "Given a chat history and the latest user question \
which might reference context in the chat history, \
formulate a standalone question which can be understood \
without the chat history. Do NOT answer the question, just \
return a suitable question that helps you to search anything related to the question in the vector DB";

pub const QA_PROMPT: &str = "You are an assistant for helping people to know about our company. Use \
the following pieces of retrieved context to answer the \
question. \
\n\n\
{context}";

pub const CONTEXT_PLACEHOLDER: &str = "{context}";

pub const LLM_BASE_URL: &str = "http://localhost:1234/v1";
pub const LLM_MODEL: &str = "gemini-1.5-flash";
pub const EMBEDDING_MODEL: &str = "text-embedding-004";
pub const REQUEST_TIMEOUT_SECS: u64 = 60;

pub const CHUNK_SIZE: usize = 500;
pub const CHUNK_OVERLAP: usize = 50;
