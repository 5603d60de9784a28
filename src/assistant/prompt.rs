//! Persona system prompt built from the page corpus

use crate::crawler::PageRecord;

/// Pages included in the prompt
pub const MAX_PROMPT_PAGES: usize = 10;

/// Characters of each page body included in the prompt
pub const MAX_PAGE_CHARS: usize = 1500;

/// Knowledge section used while the corpus is still empty
pub const LOADING_PLACEHOLDER: &str = "La información del sitio web todavía se está cargando.";

/// Reply sent when no answer could be generated
pub const APOLOGY_MESSAGE: &str = "Perdón, tuve un problema técnico y no pude responderte. \
¿Podés intentar de nuevo en unos minutos? Si el problema sigue, comunicate directamente con el colegio.";

/// Who the assistant speaks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    pub school_name: String,
    pub assistant_name: String,
}

fn truncate_chars(text: &str, max: usize) -> (&str, bool) {
    match text.char_indices().nth(max) {
        Some((idx, _)) => (&text[..idx], true),
        None => (text, false),
    }
}

/// Render the first [`MAX_PROMPT_PAGES`] pages as titled sections
pub fn knowledge_section(pages: &[PageRecord]) -> String {
    if pages.is_empty() {
        return LOADING_PLACEHOLDER.to_string();
    }

    pages
        .iter()
        .take(MAX_PROMPT_PAGES)
        .map(|page| {
            let (body, truncated) = truncate_chars(&page.body, MAX_PAGE_CHARS);
            format!(
                "### {}\n{}{}\n",
                page.title,
                body,
                if truncated { "..." } else { "" }
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the system prompt for `persona` over `pages`
pub fn build_system_prompt(persona: &Persona, pages: &[PageRecord]) -> String {
    format!(
        r#"Sos {assistant}, el asistente virtual de {school}. Respondés consultas de familias, estudiantes y visitantes con calidez y en un español rioplatense natural, usando "vos".

## CÓMO RESPONDÉS
- Saludá con cordialidad al comenzar una conversación.
- Respondé exactamente lo que te preguntan, en pocas oraciones.
- Si la consulta es ambigua (por ejemplo, no sabés si se refieren a primaria o a secundaria), preguntá antes de responder.
- Si la información no está abajo, decilo con honestidad y sugerí contactar a la secretaría. Nunca inventes datos.
- No repitas información que ya diste en la conversación.

## INFORMACIÓN DE {school}
{knowledge}"#,
        assistant = persona.assistant_name,
        school = persona.school_name,
        knowledge = knowledge_section(pages),
    )
}
