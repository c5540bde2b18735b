/// The native action a `…:action` path segment names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeAction {
    ListModels,
    GetModel,
    GenerateContent,
    StreamGenerateContent,
    EmbedContent,
    BatchEmbedContents,
    CountTokens,
    GenerateImageWithGemini,
    GenerateImageWithImagen,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Native { action: NativeAction, model: String },
    AltChat,
    AltEmbed,
    AltImage,
    AltModels,
    Unknown,
}

/// Classify a request given its HTTP method and a path that has already had
/// the gateway's `/api` prefix stripped. Never inspects the body.
pub fn classify(method: &str, path: &str) -> Classification {
    let method = method.to_ascii_uppercase();

    if method == "POST" && path.ends_with("/chat/completions") {
        return Classification::AltChat;
    }
    if method == "POST" && path.ends_with("/embeddings") {
        return Classification::AltEmbed;
    }
    if method == "POST" && path.ends_with("/images/generations") {
        return Classification::AltImage;
    }
    if method == "GET" && path.ends_with("/v1/models") {
        return Classification::AltModels;
    }

    if let Some(rest) = path.strip_prefix("/v1beta/models") {
        return classify_native_rest(rest);
    }
    if let Some(rest) = path.strip_prefix("/tunedModels") {
        return classify_native_rest(rest);
    }

    Classification::Unknown
}

/// Classify the `model` or `model:action` segment following a recognized
/// native models prefix (`/v1beta/models` or `/tunedModels`).
fn classify_native_rest(rest: &str) -> Classification {
    let rest = rest.trim_start_matches('/');
    if rest.is_empty() {
        return Classification::Native { action: NativeAction::ListModels, model: String::new() };
    }
    if let Some((model, action)) = rest.split_once(':') {
        let action = match action {
            "generateContent" => NativeAction::GenerateContent,
            "streamGenerateContent" => NativeAction::StreamGenerateContent,
            "embedContent" => NativeAction::EmbedContent,
            "batchEmbedContents" => NativeAction::BatchEmbedContents,
            "countTokens" => NativeAction::CountTokens,
            "generateImageWithGemini" => NativeAction::GenerateImageWithGemini,
            "generateImageWithImagen" => NativeAction::GenerateImageWithImagen,
            _ => return Classification::Unknown,
        };
        return Classification::Native { action, model: model.to_string() };
    }
    Classification::Native { action: NativeAction::GetModel, model: rest.to_string() }
}
