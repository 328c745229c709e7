// All LLM prompt constants for the Screening module.
// Reuses the JSON-only contract from llm_client::prompts.

/// Role line for keyword extraction; combined with the JSON-only contract.
pub const KEYWORD_ROLE: &str =
    "You are an expert technical recruiter and talent analyst with deep industry knowledge.";

/// Keyword extraction prompt template. Replace `{jd_text}` before sending.
pub const KEYWORD_PROMPT_TEMPLATE: &str = r#"Analyze the job description below and extract a prioritized list of the keywords that define the core requirements of the role.

Rules:
1. Extract atomic, standalone terms that a candidate must have to succeed: specific skills, technologies, tools, certifications, required years of experience.
2. For a FEW of the most critical keywords you may add 1-2 industry-standard synonyms or direct equivalents (e.g. "AWS" may add "Azure" or "GCP"; "PyTorch" may add "TensorFlow").
   Do this sparingly: over 90% of keywords must appear in the text itself. Never add synonyms for minor skills.
3. Prefer the spelling used in the job description.

Return a JSON object with this EXACT schema (no extra fields):
{"keywords": ["keyword1", "keyword2"]}

JOB DESCRIPTION:
---
{jd_text}
---"#;

/// Role line for the final candidate evaluation.
pub const EVALUATION_ROLE: &str = "You are an expert Senior Technical Recruiter and Hiring Manager \
    performing a definitive, final-stage evaluation of a job candidate.";

/// Evaluation prompt template.
/// Replace: {total_keywords}, {matched_count}, {matched_keywords}, {missing_keywords},
///          {initial_decision}, {resume_text}, {jd_text}
pub const EVALUATION_PROMPT_TEMPLATE: &str = r#"You are given:
1. The candidate's full resume.
2. The full job description.
3. An automated keyword screening result:
   - Total keywords required: {total_keywords}
   - Keywords found in resume: {matched_count} ({matched_keywords})
   - Keywords not found: {missing_keywords}
   - Initial automated decision: {initial_decision}

Your task is to reach a final, expert hiring decision. The keyword result is a starting point, not the answer:
a STRONG match is a positive signal, while WEAK or FAIL requires compelling, context-rich evidence in the resume to override.

Evaluate in this order:
1. Experience level: does the candidate's seniority and years of experience fit the role (intern, junior, 2-4 years, senior lead)? This is a hard filter.
2. Direct experience: does the work history align with the core responsibilities?
3. Technical proficiency: do the listed skills and technologies meet the essential requirements?
4. Contextual fit: does project history imply proficiency even where a keyword is missing (e.g. "led a cloud migration" implies AWS, GCP or Azure)?

Return a JSON object with this EXACT schema:
{
  "decision": "Shortlisted" or "Not Shortlisted",
  "evaluation_summary": "Concise, professional rationale stating why the candidate is or is not a fit.",
  "criteria_breakdown": {
    "requirements_met": ["requirement clearly satisfied or demonstrated"],
    "requirements_missing": ["core requirement not adequately evidenced"]
  },
  "overall_score": 0
}

`overall_score` is an INTEGER from 0 to 100 measuring resume-to-JD alignment, including contextual fit (not just keywords).

---
CANDIDATE RESUME:
{resume_text}

---
JOB DESCRIPTION:
{jd_text}
---"#;
