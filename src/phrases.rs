//! Fixed user-facing phrases.
//!
//! Every failure or boundary condition the assistant can hit maps to one of
//! these strings. They are short, single-sentence, and in the conversation's
//! Arabic register because they are themselves candidate inputs to speech
//! synthesis — no raw technical detail belongs here.

/// Returned when the relevant-source set is empty. Distinguished from an
/// apology: the user needs to upload sources, nothing failed.
pub const NO_SOURCES: &str = "ما عندي مصادر متاحة حالياً. لو تكرمت ارفع المصادر أول.";

/// Returned verbatim when neither the model nor the fallback can ground an
/// answer in source content. The remote system instruction quotes the same
/// string so downstream consumers can treat both strategies uniformly.
pub const OUT_OF_SCOPE: &str = "اعتذر منك عزيزي، هذا الموضوع خارج نطاق المصادر المتاحة عندي.";

/// Mapped from a remote HTTP 429.
pub const SYSTEM_BUSY: &str = "النظام مشغول حالياً. حاول مرة ثانية بعد قليل.";

/// Mapped from a remote HTTP 400 (usually a rejected file attachment).
pub const FILE_ERROR: &str = "عذراً، صار خطأ أثناء معالجة الملفات المرفقة. حاول مرة ثانية.";

/// Mapped from any other remote error status.
pub const GENERIC_APOLOGY: &str = "عذراً، حدث خطأ. حاول مرة ثانية.";

/// Shown when speech synthesis has no configured provider.
pub const TTS_NOT_CONFIGURED: &str = "خدمة الصوت غير مُعدّة";

/// Mapped from a TTS HTTP 429.
pub const TTS_BUSY: &str = "خدمة الصوت مشغولة حالياً";

/// Mapped from any other speech synthesis failure.
pub const TTS_FAILED: &str = "حدث خطأ في توليد الصوت";

/// Seed message of the advisor conversation log.
pub const WELCOME_ADVISOR: &str = "يا أهلاً بك.. معك المستشار المعرفي، يسعدني مرافقتك في رحلة الانتقال للشركة القابضة. تفضل، كيف يمكنني خدمتك اليوم؟\nممكن نتشرف باسمك؟";

/// Seed message of the repository conversation log.
pub const WELCOME_REPOSITORY: &str = "أهلاً بك في مكتبتك الرقمية.. مستشارك المعرفي جاهز لمساعدتك في تحليل واستخراج المعلومات من الوثائق التي تختارها.\nممكن نتشرف باسمك؟";

/// Appended to the repository log when the user focuses a single source.
pub fn source_activated(name: &str) -> String {
    format!(
        "يا أهلاً بك، تم تفعيل المصدر: \"{}\".. كيف يمكن لمستشارك المعرفي خدمتك في تحليل محتوى هذا الملف؟",
        name
    )
}

/// System instruction sent with every remote request. Enforces the grounding
/// contract: answer only from the attached sources, emit [`OUT_OF_SCOPE`]
/// verbatim when ungrounded, match the question's language, and keep
/// sentences short enough for speech synthesis.
pub const SYSTEM_INSTRUCTION: &str = "أنت المستشار المعرفي، صديق وزميل داعم للموظفين المنتقلين من وزارة الصحة إلى الشركة القابضة.\n\
\n\
قواعد المعرفة:\n\
- أجب من المصادر المرفقة فقط، ولا تخترع معلومات.\n\
- إذا ما لقيت الجواب في المصادر، قل حرفياً: \"اعتذر منك عزيزي، هذا الموضوع خارج نطاق المصادر المتاحة عندي.\"\n\
\n\
أسلوب الكلام:\n\
- أجب بنفس لغة السؤال.\n\
- جمل قصيرة وطبيعية، لأن الإجابة قد تُحوّل إلى صوت.\n\
- الأرقام بالحروف دائماً.\n\
- اختم بتشجيع أو سؤال ودي.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_instruction_quotes_out_of_scope_phrase() {
        // The model must be able to emit the exact phrase the rest of the
        // system matches on.
        assert!(SYSTEM_INSTRUCTION.contains(OUT_OF_SCOPE));
    }

    #[test]
    fn source_activated_embeds_name() {
        let msg = source_activated("سلم الرواتب");
        assert!(msg.contains("سلم الرواتب"));
    }

    #[test]
    fn phrases_are_single_short_sentences() {
        for phrase in [
            NO_SOURCES,
            OUT_OF_SCOPE,
            SYSTEM_BUSY,
            FILE_ERROR,
            GENERIC_APOLOGY,
            TTS_NOT_CONFIGURED,
            TTS_BUSY,
            TTS_FAILED,
        ] {
            assert!(!phrase.is_empty());
            assert!(!phrase.contains('\n'));
        }
    }
}
