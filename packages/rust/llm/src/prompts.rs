//! Conversation builders for the four pipeline prompts.
//!
//! Each builder returns a full system/user/assistant conversation; the
//! trailing assistant message primes the model to answer in the shape the
//! parsers in [`crate::extract`] expect.

use crate::client::Message;

/// Commentary comparing a parsed résumé against the applicant's target position.
pub fn resume_commentary(resume: &str, position: &str) -> Vec<Message> {
    let system = "You are Assistant, you will compare the given parsed resume with the \
        desired job position and write down commentaries and summaries on it.\n\n\
        The summary/commentary must contain:\n\
        1. The job seeker's background\n\
        2. The job seeker's related experience with the position they're applying (if any)\n\
        3. The job seeker's additional and adjacent experience with similar stuff\n\
        4. Any critique or praise for the resume\n\
        5. Missing information if any\n\n\
        Important: DO NOT make any decision on job acceptance or not. Assistant only \
        comments, Assistant does not make any accepting-related comment. Also DO NOT \
        make any comment on resume formatting/structure/etc.";
    let user = format!(
        "<parsed_resume> {resume} </parsed_resume>\n\
         <parsed_job_position>{position}</parsed_job_position> \
         Based on the given data, write down your commentary"
    );

    vec![
        Message::system(system),
        Message::user(user),
        Message::assistant("Understood, here's my detailed commentary on the resume."),
    ]
}

/// Five bracket-delimited interview questions derived from a résumé commentary.
pub fn interview_questions(commentary: &str) -> Vec<Message> {
    let system = "You are Assistant, you will create 5 interview questions from the given \
        resume summary and commentary\n\n\
        The 5 interview questions must contain:\n\
        1. Asking for missing details in the resume if any\n\
        2. Asking in more detail about the job seeker's experience\n\
        3. Asking in more detail about the job seeker's prior experience\n\
        4. Asking in more detail about the job seeker's motivation\n\
        5. All questions must refer to the job seeker's resume and desired job position\n\n\
        Each question MUST be written between brackets like in the following format:\n\
        [1. What is your full name?]\n\
        [2. This is an example question, obviously]\n\
        [3. Also example question?]";
    let user = format!(
        "<parsed_commentary> {commentary} </parsed_commentary>\n \
         Write down 5 interview questions based on the resume commentary"
    );

    vec![
        Message::system(system),
        Message::user(user),
        Message::assistant("Understood, here's 5 related interview questions:"),
    ]
}

/// Qualitative judgement of one answer against its question.
pub fn answer_judgement(question: &str, answer: &str) -> Vec<Message> {
    let system = "You are Assistant, you will judge the given parsed answers from the \
        questions.\n\n\
        Your judgement will be written in an explanatory format, highlight both the good \
        and the bad. The judgement must contain:\n\
        1. Measure how relevant the answer is to the question asked.\n\
        2. How much it highlights their experience or if it is more focused on theories\n\
        3. How 'honest' it sounds or if it actually sounds like something overly \
        glorified/made up\n\
        DO NOT make any comment on resume formatting/structure/etc.";
    let user = format!(
        "<parsed_question> {question} </parsed_question>\n\
         <parsed_answer>{answer}</parsed_answer> \
         Based on the given data, write down your judgement"
    );

    vec![
        Message::system(system),
        Message::user(user),
        Message::assistant("Understood, here's my detailed judgement on the answer."),
    ]
}

/// Bracketed numeric score derived from a judgement.
pub fn answer_score(judgement: &str) -> Vec<Message> {
    let system = "You are Assistant, you will score the result of a technical test based \
        on a given explanatory result. The score must be formatted between `[ ]` like for \
        example: [Score: 87] the scoring criteria is simply based on the commentary given.";
    let user = format!(
        "<parsed_commentary> {judgement} </parsed_commentary>\n \
         Write down the score based on the commentary"
    );

    vec![
        Message::system(system),
        Message::user(user),
        Message::assistant("Understood, here's the score:"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Role;

    fn roles(messages: &[Message]) -> Vec<Role> {
        messages.iter().map(|m| m.role).collect()
    }

    #[test]
    fn conversations_are_system_user_assistant() {
        for conversation in [
            resume_commentary("resume", "position"),
            interview_questions("commentary"),
            answer_judgement("q", "a"),
            answer_score("judgement"),
        ] {
            assert_eq!(
                roles(&conversation),
                vec![Role::System, Role::User, Role::Assistant]
            );
        }
    }

    #[test]
    fn commentary_embeds_both_inputs() {
        let conversation = resume_commentary("RESUME_TEXT", "POSITION_TEXT");
        let user = &conversation[1].content;
        assert!(user.contains("<parsed_resume> RESUME_TEXT </parsed_resume>"));
        assert!(user.contains("<parsed_job_position>POSITION_TEXT</parsed_job_position>"));
    }

    #[test]
    fn questions_prompt_demands_bracket_format() {
        let conversation = interview_questions("summary");
        assert!(conversation[0].content.contains("[1. What is your full name?]"));
    }

    #[test]
    fn score_prompt_demands_score_format() {
        let conversation = answer_score("good answer overall");
        assert!(conversation[0].content.contains("[Score: 87]"));
    }
}
