//! Task constructors for the supported workloads
//!
//! Each builder returns a [`TaskDescriptor`] carrying the task type's default
//! schema and strategy, so callers only choose the inputs. Prompts ask for
//! JSON matching that schema; the normalizer copes when a model ignores the
//! request.

use crate::config::truncate_chars;
use crate::protocol::{JobQuery, PromptPayload, TaskDescriptor, TaskType};

/// Longest excerpt of a user document embedded in a prompt
const MAX_DOCUMENT_CHARS: usize = 4000;

const JSON_ONLY: &str = "Return ONLY valid JSON, no markdown and no explanations.";

fn excerpt(text: &str) -> String {
    truncate_chars(text.trim(), MAX_DOCUMENT_CHARS)
}

fn or_unknown(text: &str) -> &str {
    if text.trim().is_empty() {
        "Not provided"
    } else {
        text
    }
}

/// Interview questions for a position
pub fn interview_questions(
    job_title: &str,
    company: Option<&str>,
    job_description: &str,
) -> TaskDescriptor {
    let prompt = format!(
        "Generate interview questions for this position.\n\n\
         Job Title: {}\nCompany: {}\nJob Description: {}\n\n\
         Ask about the technologies and responsibilities the description mentions.\n\
         {}\n\
         {{\"technical\": [\"8-10 technical questions\"], \"behavioral\": [\"5 behavioral questions\"], \
         \"company\": [\"3 questions about company and role fit\"], \"general\": [\"2 general career questions\"]}}",
        job_title,
        company.unwrap_or("Not specified"),
        excerpt(or_unknown(job_description)),
        JSON_ONLY,
    );
    TaskDescriptor::prompt(
        TaskType::GenerateQuestions,
        PromptPayload::new(prompt)
            .with_system("You are an experienced technical interviewer.")
            .with_temperature(0.8),
    )
}

/// Suggested answer to one interview question
pub fn interview_answer(
    question: &str,
    job_title: &str,
    background: Option<&str>,
) -> TaskDescriptor {
    let mut prompt = format!(
        "Write a strong, concise answer to this interview question for a {} role.\n\nQuestion: {}\n",
        job_title, question
    );
    if let Some(background) = background {
        prompt.push_str(&format!("\nCandidate background:\n{}\n", excerpt(background)));
    }
    prompt.push_str("\nAnswer in first person, in two or three short paragraphs.");
    TaskDescriptor::prompt(TaskType::GenerateAnswer, PromptPayload::new(prompt))
}

/// Cover letter tailored to a job
pub fn cover_letter(resume: &str, job_description: &str, tone: &str) -> TaskDescriptor {
    let prompt = format!(
        "Write a {} cover letter for the job below, based on the candidate's resume.\n\n\
         RESUME:\n{}\n\nJOB DESCRIPTION:\n{}\n\n{}\n{{\"cover_letter\": \"the full letter\"}}",
        tone,
        excerpt(or_unknown(resume)),
        excerpt(or_unknown(job_description)),
        JSON_ONLY,
    );
    TaskDescriptor::prompt(
        TaskType::GenerateCoverLetter,
        PromptPayload::new(prompt).with_system("You are a professional career writer."),
    )
}

/// Structured profile extracted from a resume
pub fn analyze_resume(resume: &str) -> TaskDescriptor {
    let prompt = format!(
        "Extract the candidate profile from this resume.\n\nRESUME:\n{}\n\n{}\n\
         {{\"skills\": [], \"experience_years\": 0, \"job_titles\": [], \"location_preference\": null, \
         \"education\": null, \"certifications\": []}}",
        excerpt(resume),
        JSON_ONLY,
    );
    TaskDescriptor::prompt(
        TaskType::AnalyzeResume,
        PromptPayload::new(prompt).with_temperature(0.2),
    )
}

/// Resume rewritten for a job using a named template
pub fn generate_resume(profile: &str, job_description: &str, template: &str) -> TaskDescriptor {
    let prompt = format!(
        "Write a resume in the '{}' style for the candidate below, targeted at the job description.\n\n\
         CANDIDATE:\n{}\n\nJOB DESCRIPTION:\n{}\n\n{}\n{{\"resume\": \"the full resume as plain text\"}}",
        template,
        excerpt(profile),
        excerpt(or_unknown(job_description)),
        JSON_ONLY,
    );
    TaskDescriptor::prompt(
        TaskType::GenerateResume,
        PromptPayload::new(prompt).with_max_tokens(4096),
    )
}

/// Fit score of a resume against a job
pub fn match_job(resume: &str, job_description: &str) -> TaskDescriptor {
    let prompt = format!(
        "Score how well this candidate matches the job from 0 to 100.\n\n\
         RESUME:\n{}\n\nJOB DESCRIPTION:\n{}\n\n{}\n\
         {{\"score\": 0, \"matching_skills\": [], \"missing_skills\": [], \"reason\": \"\", \"confidence\": \"low|medium|high\"}}",
        excerpt(resume),
        excerpt(job_description),
        JSON_ONLY,
    );
    TaskDescriptor::prompt(
        TaskType::MatchJobs,
        PromptPayload::new(prompt).with_temperature(0.2),
    )
}

/// Company profile and resume advice
pub fn research_company(company: &str) -> TaskDescriptor {
    let prompt = format!(
        "Describe the company '{}' for a job applicant.\n\n{}\n\
         {{\"company_type\": \"startup|enterprise|agency|...\", \"culture_keywords\": [], \
         \"recommended_template\": \"\", \"accepted_templates\": [], \"resume_format_tips\": []}}",
        company, JSON_ONLY,
    );
    TaskDescriptor::prompt(TaskType::ResearchCompany, PromptPayload::new(prompt))
}

/// Skills worth learning for a role
pub fn suggest_skills(role: &str, current_skills: &[String]) -> TaskDescriptor {
    let current = if current_skills.is_empty() {
        "none listed".to_string()
    } else {
        current_skills.join(", ")
    };
    let prompt = format!(
        "List the 10 most valuable skills for a {} that the candidate does not have yet.\n\
         Current skills: {}\n\n{}\n[\"skill\", ...]",
        role, current, JSON_ONLY,
    );
    TaskDescriptor::prompt(TaskType::SuggestSkills, PromptPayload::new(prompt))
}

/// Job search across the configured boards
pub fn job_search(query: JobQuery) -> TaskDescriptor {
    let limit = query.limit;
    TaskDescriptor::job_search(query).with_max_results(limit)
}
